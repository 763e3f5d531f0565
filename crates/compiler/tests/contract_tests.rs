use bindery_compiler::{
    Contract, ContractCompiler, ContractDocument, ResponseKey, ResponseSchema, parse_document_str,
};
use bindery_registry::FieldKind;
use bindery_types::{HttpMethod, ParamLocation, ParamMode, SpecError};

fn load_fixture() -> ContractDocument {
    let raw = parse_document_str(include_str!("data/login_api.yaml")).expect("parse login_api.yaml");
    ContractDocument::from_value(raw).expect("valid document")
}

/// Wraps one operation under `/v1/auth/login` in a minimal contract.
fn single_operation(operation: &str) -> ContractDocument {
    let indented: String = operation.lines().map(|line| format!("      {line}\n")).collect();
    let text = format!(
        "swagger: '2.0'\nhost: pnt-login.elasticbeanstalk.com\nschemes:\n  - http\n  - https\npaths:\n  /v1/auth/login:\n    post:\n{indented}definitions:\n  Credentials:\n    type: object\n    properties:\n      email:\n        type: string\n"
    );
    ContractDocument::from_value(parse_document_str(&text).expect("parse yaml")).expect("valid document")
}

fn compile_single(operation: &str) -> Result<Vec<bindery_types::EndpointDescriptor>, SpecError> {
    let document = single_operation(operation);
    ContractCompiler::new(&document).compile_all()
}

#[test]
fn fixture_resolves_connection_and_version() {
    let document = load_fixture();
    assert_eq!(document.host(), "pnt-login.elasticbeanstalk.com");
    assert_eq!(document.port(), 80);
    assert_eq!(document.scheme().as_str(), "http");
    assert_eq!(document.version(), "0.0.1");
}

#[test]
fn compiles_every_bound_operation_and_skips_unbound_ones() {
    let document = load_fixture();
    let endpoints = ContractCompiler::new(&document).compile_all().expect("compile");
    let paths: Vec<_> = endpoints.iter().map(|endpoint| endpoint.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["/v1/auth/login", "/v1/auth/logout/", "/v1/version/", "/v1/sessions"]
    );

    let login = &endpoints[0];
    assert_eq!(login.method, HttpMethod::Post);
    assert_eq!(login.handler_server, "pnt_login.handlers.do_login");
    assert_eq!(login.handler_client.as_deref(), Some("login"));
    assert!(!login.requires_auth);
    assert_eq!(login.param_mode, ParamMode::Body);
    assert!(login.decorate_server.is_none());
    assert!(login.decorate_request.is_none());

    let logout = &endpoints[1];
    assert_eq!(logout.method, HttpMethod::Get);
    assert_eq!(logout.handler_server, "pnt_login.babar");
    assert!(logout.handler_client.is_none());
    assert!(logout.requires_auth);
    assert_eq!(logout.param_mode, ParamMode::Query);
    assert_eq!(logout.decorate_request.as_deref(), Some("foo.bar.baz"));

    let version = &endpoints[2];
    assert_eq!(version.param_mode, ParamMode::None);
    assert_eq!(version.decorate_server.as_deref(), Some("foo.bar.baz"));
}

#[test]
fn operation_parameters_override_path_parameters() {
    let document = load_fixture();
    let endpoints = ContractCompiler::new(&document).compile_all().expect("compile");
    let logout = &endpoints[1];

    let names: Vec<_> = logout.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["baboom", "page"]);
    let baboom = &logout.parameters[0];
    assert!(baboom.required);
    assert_eq!(baboom.raw["type"], "string");
    assert_eq!(logout.parameters[1].location, ParamLocation::Query);
}

#[test]
fn push_traversal_visits_the_same_endpoints() {
    let document = load_fixture();
    let compiler = ContractCompiler::new(&document);
    let mut visited = Vec::new();
    compiler
        .for_each_endpoint(|endpoint| visited.push(endpoint.label()))
        .expect("traverse");
    assert_eq!(
        visited,
        vec![
            "POST /v1/auth/login",
            "GET /v1/auth/logout/",
            "GET /v1/version/",
            "GET /v1/sessions"
        ]
    );
}

#[test]
fn missing_produces_is_rejected() {
    let error = compile_single("x-bind-server: pnt_login.handlers.do_login\n").expect_err("no produces");
    assert_eq!(
        error,
        SpecError::MissingProduces {
            operation: "POST /v1/auth/login".into()
        }
    );
    assert_eq!(
        error.to_string(),
        "contract has no 'produces' section for POST /v1/auth/login"
    );
}

#[test]
fn non_json_produces_is_rejected() {
    let error = compile_single("produces:\n  - foo/bar\nx-bind-server: do_login\n").expect_err("non-json");
    assert!(matches!(error, SpecError::UnsupportedProduces { ref produces, .. } if produces == "foo/bar"));
}

#[test]
fn too_many_produces_is_rejected() {
    let error = compile_single("produces:\n  - application/json\n  - foo/bar\nx-bind-server: do_login\n")
        .expect_err("two produces");
    assert!(matches!(error, SpecError::TooManyProduces { .. }));
}

#[test]
fn missing_server_binding_is_rejected() {
    let error = compile_single("produces:\n  - application/json\n").expect_err("no x-bind-server");
    assert_eq!(
        error,
        SpecError::MissingServerBinding {
            operation: "POST /v1/auth/login".into()
        }
    );
}

#[test]
fn non_boolean_auth_flag_is_rejected() {
    let error = compile_single("produces:\n  - application/json\nx-bind-server: do_login\nx-auth-required: 'no'\n")
        .expect_err("string auth flag");
    assert!(matches!(error, SpecError::InvalidAuthFlag { .. }));
}

#[test]
fn non_string_client_binding_is_rejected() {
    let error = compile_single("produces:\n  - application/json\nx-bind-server: do_login\nx-bind-client: 12\n")
        .expect_err("numeric client name");
    assert!(matches!(error, SpecError::InvalidExtension { ref key, .. } if key == "x-bind-client"));
}

#[test]
fn path_parameters_are_rejected() {
    let error = compile_single(
        "produces:\n  - application/json\nx-bind-server: do_version\nparameters:\n  - in: body\n    name: whatever\n    schema:\n      $ref: '#/definitions/Credentials'\n  - in: path\n    name: foo\n    type: string\n",
    )
    .expect_err("path parameter");
    assert_eq!(
        error,
        SpecError::PathParameter {
            operation: "POST /v1/auth/login".into(),
            name: "foo".into()
        }
    );
}

#[test]
fn mixed_body_and_query_parameters_are_rejected() {
    let error = compile_single(
        "produces:\n  - application/json\nx-bind-server: do_login\nparameters:\n  - in: body\n    name: whatever\n    schema:\n      $ref: '#/definitions/Credentials'\n  - in: query\n    name: q\n    type: string\n",
    )
    .expect_err("mixed placement");
    assert!(matches!(error, SpecError::UnsupportedParameterModel { .. }));
}

#[test]
fn header_parameters_are_rejected() {
    let error = compile_single(
        "produces:\n  - application/json\nx-bind-server: do_login\nparameters:\n  - in: header\n    name: X-Token\n    type: string\n",
    )
    .expect_err("header parameter");
    assert!(matches!(error, SpecError::UnsupportedParameterModel { .. }));
}

#[test]
fn iterator_stops_after_first_error() {
    let document = single_operation("x-bind-server: do_login\n");
    let results: Vec<_> = ContractCompiler::new(&document).endpoints().collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
}

#[test]
fn contract_binds_body_query_and_response_schemas() {
    let contract = Contract::compile(load_fixture()).expect("compile contract");
    let endpoints = contract.endpoints();
    assert_eq!(endpoints.len(), 4);

    let login = &endpoints[0];
    let body = login.schema.body.as_ref().expect("body parameter");
    assert_eq!(body.model, "Credentials");
    assert_eq!(body.name, "whatever");
    assert!(body.required);
    assert_eq!(
        login.schema.response_for(200),
        Some(&ResponseSchema::Model("SessionToken".into()))
    );
    assert_eq!(login.schema.response_for(401), Some(&ResponseSchema::Model("Error".into())));

    let logout = &endpoints[1];
    let kinds: Vec<_> = logout.schema.query.iter().map(|q| (q.name.as_str(), q.kind.clone())).collect();
    assert_eq!(
        kinds,
        vec![("baboom", FieldKind::String), ("page", FieldKind::Integer)]
    );
    assert_eq!(logout.schema.response_for(404), None);

    let version = &endpoints[2];
    assert!(matches!(version.schema.response_for(200), Some(ResponseSchema::Json(_))));

    let sessions = &endpoints[3];
    assert_eq!(
        sessions.schema.responses.get(&ResponseKey::Status(200)),
        Some(&ResponseSchema::List("SessionToken".into()))
    );
}

#[test]
fn binding_table_lists_server_rows() {
    let contract = Contract::compile(load_fixture()).expect("compile contract");
    let table = contract.binding_table();
    assert_eq!(table.len(), 4);
    let login = &table[0];
    assert_eq!(login.path, "/v1/auth/login");
    assert_eq!(login.method, HttpMethod::Post);
    assert_eq!(login.handler_server, "pnt_login.handlers.do_login");
    assert_eq!(login.param_mode, ParamMode::Body);
    assert!(!login.requires_auth);

    let encoded = serde_json::to_value(&table[1]).expect("serialize row");
    assert_eq!(encoded["method"], "GET");
    assert_eq!(encoded["param_mode"], "query");
    assert_eq!(encoded["decorate_request"], "foo.bar.baz");
}

#[test]
fn body_parameter_without_definition_reference_is_rejected() {
    let document = single_operation(
        "produces:\n  - application/json\nx-bind-server: do_login\nparameters:\n  - in: body\n    name: whatever\n    schema:\n      type: object\n",
    );
    let error = Contract::compile(document).expect_err("inline body schema");
    assert!(matches!(error, SpecError::UnsupportedParameterModel { .. }));
}

#[test]
fn response_referencing_undefined_model_is_rejected() {
    let document = single_operation(
        "produces:\n  - application/json\nx-bind-server: do_login\nresponses:\n  200:\n    description: ok\n    schema:\n      $ref: '#/definitions/Ghost'\n",
    );
    let error = Contract::compile(document).expect_err("undefined response model");
    assert!(matches!(error, SpecError::UndefinedModel { ref name, .. } if name == "Ghost"));
}

#[test]
fn inline_response_objects_check_nested_references() {
    let document = single_operation(
        "produces:\n  - application/json\nx-bind-server: do_login\nresponses:\n  200:\n    description: ok\n    schema:\n      type: object\n      properties:\n        tok:\n          $ref: '#/definitions/Ghost'\n",
    );
    let error = Contract::compile(document).expect_err("nested undefined model");
    assert!(matches!(error, SpecError::UndefinedModel { ref name, .. } if name == "Ghost"));

    let document = single_operation(
        "produces:\n  - application/json\nx-bind-server: do_login\nresponses:\n  200:\n    description: ok\n    schema:\n      type: object\n      properties:\n        who:\n          $ref: '#/definitions/Credentials'\n",
    );
    let contract = Contract::compile(document).expect("nested reference to a real model");
    assert_eq!(contract.endpoints().len(), 1);
}
