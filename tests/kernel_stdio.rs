//! Drives the JSON-RPC front end against a real session. Evaluations redirect
//! file descriptor 1, so the whole conversation is one test.
#![cfg(unix)]

use serde_json::{json, Value};
use tcl_kernel::config::KernelConfig;
use tcl_kernel::kernel_executor::KernelHandle;
use tcl_kernel::server::KernelServer;

fn parse(lines: &[String]) -> Vec<Value> {
    lines
        .iter()
        .map(|line| serde_json::from_str(line).expect("output line is JSON"))
        .collect()
}

async fn call(server: &mut KernelServer, id: u64, method: &str, params: Value) -> Vec<Value> {
    let request = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
    parse(&server.handle_line(&request.to_string()).await)
}

#[tokio::test]
async fn notebook_conversation() {
    let kernel = KernelHandle::start(KernelConfig::without_startup_script())
        .await
        .unwrap();
    let mut server = KernelServer::new(kernel);

    // kernel info
    let out = call(&mut server, 1, "kernel_info_request", json!({})).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["result"]["implementation"], "Tcl Kernel");
    assert_eq!(out[0]["result"]["language_info"]["name"], "tcl");

    // completeness
    let out = call(&mut server, 2, "is_complete_request", json!({ "code": "puts hi" })).await;
    assert_eq!(out[0]["result"], json!({ "status": "complete", "indent": "" }));
    let out = call(&mut server, 3, "is_complete_request", json!({ "code": "proc f {} {" })).await;
    assert_eq!(out[0]["result"], json!({ "status": "incomplete", "indent": "" }));

    // output arrives as a notification ahead of the reply
    let out = call(
        &mut server,
        4,
        "execute_request",
        json!({ "code": "set greeting hi\nputs $greeting", "execution_count": 1 }),
    )
    .await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["method"], "stream");
    assert_eq!(out[0]["params"], json!({ "name": "stdout", "text": "hi\n" }));
    assert_eq!(out[1]["id"], 4);
    assert_eq!(
        out[1]["result"],
        json!({ "status": "ok", "execution_count": 1, "payload": [], "user_expressions": {} })
    );

    // state carries over to the next cell
    let out = call(
        &mut server,
        5,
        "execute_request",
        json!({ "code": "string length $greeting", "execution_count": 2 }),
    )
    .await;
    assert_eq!(out[0]["params"]["text"], "2");

    // interpreter errors are stream content, not protocol errors
    let out = call(
        &mut server,
        6,
        "execute_request",
        json!({ "code": "no_such_proc", "execution_count": 3 }),
    )
    .await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["params"]["name"], "stderr");
    assert!(out[0]["params"]["text"].as_str().unwrap().contains("invalid command name"));
    assert_eq!(out[1]["result"]["status"], "ok");
    assert_eq!(out[1]["result"]["execution_count"], 3);

    // silent requests publish nothing
    let out = call(
        &mut server,
        7,
        "execute_request",
        json!({ "code": "puts shh", "silent": true, "execution_count": 4 }),
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["result"]["execution_count"], 4);

    // malformed params are rejected by the adapter
    let out = call(&mut server, 8, "execute_request", json!({ "silent": true })).await;
    assert!(out[0]["error"].is_object());

    assert!(!server.is_shutdown());
    let out = call(&mut server, 9, "shutdown_request", json!({})).await;
    assert_eq!(out[0]["result"], json!({ "status": "ok", "restart": false }));
    assert!(server.is_shutdown());
}
