use std::time::Duration;

use trialgraph::diff_flow::{BackendRequest, CompareRequest};
use trialgraph::error::FetchError;
use trialgraph::http::{HttpTransport, NullTransport, Ticket, Transport};

#[test]
fn resolves_absolute_and_relative_paths() {
    let (transport, _rx) = HttpTransport::new("http://localhost:5000/trials/").unwrap();
    let args = BackendRequest::FunctionArguments {
        trial: "1".into(),
        activation: "5".into(),
    };
    assert_eq!(
        transport.resolve(&args.path()).unwrap().as_str(),
        "http://localhost:5000/diff/getFunctionActivationArguments/1/5"
    );
    let compare = BackendRequest::Compare(CompareRequest {
        pairs: vec![("1".into(), "5".into()), ("2".into(), "9".into())],
    });
    assert_eq!(
        transport.resolve(&compare.path()).unwrap().as_str(),
        "http://localhost:5000/trials/commands/diff/1/5/2/9"
    );
}

#[test]
fn rejects_invalid_base() {
    assert!(matches!(HttpTransport::new("not a url"), Err(FetchError::InvalidUrl(_))));
}

#[test]
fn unreachable_backend_completes_with_error() {
    let (transport, rx) = HttpTransport::new("http://127.0.0.1:1/").unwrap();
    let ticket = Ticket {
        graph_id: "g1".into(),
        seq: 4,
    };
    transport.send(
        ticket.clone(),
        &BackendRequest::FunctionArguments {
            trial: "1".into(),
            activation: "5".into(),
        },
    )
    .unwrap();
    let completion = rx.recv_timeout(Duration::from_secs(30)).unwrap();
    assert_eq!(completion.ticket, ticket);
    assert!(matches!(completion.result, Err(FetchError::Network(_))));
}

#[test]
fn null_transport_refuses_requests() {
    let ticket = Ticket {
        graph_id: "g1".into(),
        seq: 1,
    };
    let request = BackendRequest::FunctionArguments {
        trial: "1".into(),
        activation: "5".into(),
    };
    assert!(matches!(NullTransport.send(ticket, &request), Err(FetchError::Network(_))));
}
