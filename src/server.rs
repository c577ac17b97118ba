use anyhow::Result;
use jsonrpc_core::{ErrorCode, IoHandler, Params, Value};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::kernel::{ExecuteRequest, StreamMessage};
use crate::kernel_executor::KernelHandle;

#[derive(Debug, Deserialize)]
struct IsCompleteParams {
    code: String,
}

/// Line-delimited JSON-RPC front for the kernel.
///
/// Stream messages produced by an `execute_request` are written as `stream`
/// notifications ahead of that request's response.
pub struct KernelServer {
    handler: IoHandler,
    streams: mpsc::UnboundedReceiver<StreamMessage>,
    shutdown: Arc<AtomicBool>,
}

impl KernelServer {
    pub fn new(kernel: KernelHandle) -> Self {
        let (stream_tx, streams) = mpsc::unbounded_channel::<StreamMessage>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handler = IoHandler::new();

        let k = kernel.clone();
        handler.add_method("execute_request", move |params: Params| {
            let k = k.clone();
            let stream_tx = stream_tx.clone();
            async move {
                let request: ExecuteRequest = params.parse()?;
                debug!(execution_count = request.execution_count, silent = request.silent, "execute_request");

                let outcome = k.execute(request).await.map_err(internal_error)?;
                for message in outcome.streams {
                    // The receiver lives in the server, which outlives its handler.
                    let _ = stream_tx.send(message);
                }
                Ok::<_, jsonrpc_core::Error>(json!(outcome.reply))
            }
        });

        let k = kernel.clone();
        handler.add_method("is_complete_request", move |params: Params| {
            let k = k.clone();
            async move {
                let IsCompleteParams { code } = params.parse()?;
                let verdict = k.is_complete(code).await.map_err(internal_error)?;
                Ok::<_, jsonrpc_core::Error>(json!(verdict))
            }
        });

        let k = kernel;
        handler.add_method("kernel_info_request", move |_params: Params| {
            let k = k.clone();
            async move {
                let info = k.kernel_info().await.map_err(internal_error)?;
                Ok::<_, jsonrpc_core::Error>(json!(info))
            }
        });

        let flag = shutdown.clone();
        handler.add_sync_method("shutdown_request", move |_params: Params| {
            info!("Shutdown requested");
            flag.store(true, Ordering::SeqCst);
            Ok(json!({ "status": "ok", "restart": false }))
        });

        Self {
            handler,
            streams,
            shutdown,
        }
    }

    /// Process one input line and return the lines to write back, in order.
    pub async fn handle_line(&mut self, line: &str) -> Vec<String> {
        let mut out = Vec::new();
        let response = self.handler.handle_request(line).await;

        while let Ok(message) = self.streams.try_recv() {
            out.push(stream_notification(&message).to_string());
        }
        if let Some(response) = response {
            out.push(response);
        }
        out
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub async fn run_stdio(self) -> Result<()> {
        info!("Starting Tcl kernel on stdio");

        let reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.serve(reader, &mut stdout).await
    }

    /// Answer requests read from `reader` until EOF or a shutdown request.
    pub async fn serve<R, W>(mut self, mut reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        while !self.is_shutdown() {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break; // EOF
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!("Received request: {}", trimmed);

            for output in self.handle_line(trimmed).await {
                debug!("Sending: {}", output);
                writer.write_all(output.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            writer.flush().await?;
        }

        info!("Tcl kernel stopped");
        Ok(())
    }
}

fn stream_notification(message: &StreamMessage) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "stream",
        "params": message,
    })
}

fn internal_error(e: anyhow::Error) -> jsonrpc_core::Error {
    jsonrpc_core::Error {
        code: ErrorCode::InternalError,
        message: format!("{:#}", e),
        data: None,
    }
}
