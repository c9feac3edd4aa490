/// Returns `true` when the sandbox forbids binding a localhost socket, in which case
/// tests that start an `httpmock` server should bail out early.
pub fn should_skip_httpmock() -> bool {
    match std::net::TcpListener::bind(("127.0.0.1", 0)) {
        Ok(_) => false,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            eprintln!("skipping upstream mock test: binding localhost is not permitted");
            true
        }
        Err(err) => panic!("failed to bind localhost for upstream mock tests: {err}"),
    }
}
