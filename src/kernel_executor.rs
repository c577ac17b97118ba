use anyhow::{Result, anyhow};
use std::thread;
use tokio::sync::{mpsc, oneshot};

use crate::completeness::Completeness;
use crate::config::KernelConfig;
use crate::kernel::{ExecuteReply, ExecuteRequest, KernelInfo, StreamMessage, TclKernel};

/// What one execute request produced: the stream messages in publish order
/// and the reply for the framework.
#[derive(Debug)]
pub struct ExecuteOutcome {
    pub streams: Vec<StreamMessage>,
    pub reply: ExecuteReply,
}

pub enum KernelCommand {
    Execute {
        request: ExecuteRequest,
        response: oneshot::Sender<Result<ExecuteOutcome>>,
    },
    IsComplete {
        code: String,
        response: oneshot::Sender<Completeness>,
    },
    KernelInfo {
        response: oneshot::Sender<KernelInfo>,
    },
}

/// Owns the kernel on a dedicated thread. The interpreter is not `Send`, and
/// a single consumer serializes evaluations so only one capture window is
/// ever open.
pub struct KernelExecutor {
    kernel: TclKernel,
}

impl KernelExecutor {
    /// Start the executor thread and wait for the session to come up.
    pub async fn spawn(config: KernelConfig) -> Result<mpsc::Sender<KernelCommand>> {
        let (tx, mut rx) = mpsc::channel::<KernelCommand>(100);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        thread::Builder::new()
            .name("tcl-kernel".to_string())
            .spawn(move || {
                let mut executor = match TclKernel::from_config(&config) {
                    Ok(kernel) => {
                        let _ = ready_tx.send(Ok(()));
                        KernelExecutor { kernel }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Some(cmd) = rx.blocking_recv() {
                    executor.handle(cmd);
                }
                tracing::debug!("Kernel command channel closed, executor exiting");
            })?;

        ready_rx
            .await
            .map_err(|_| anyhow!("Kernel thread exited before reporting startup"))??;

        Ok(tx)
    }

    fn handle(&mut self, cmd: KernelCommand) {
        match cmd {
            KernelCommand::Execute { request, response } => {
                let mut streams = Vec::new();
                let result = self
                    .kernel
                    .execute(&request, &mut streams)
                    .map(|reply| ExecuteOutcome { streams, reply });
                let _ = response.send(result);
            }
            KernelCommand::IsComplete { code, response } => {
                let _ = response.send(self.kernel.is_complete(&code));
            }
            KernelCommand::KernelInfo { response } => {
                let _ = response.send(self.kernel.kernel_info());
            }
        }
    }
}

/// Cloneable front for the executor thread
#[derive(Clone)]
pub struct KernelHandle {
    commands: mpsc::Sender<KernelCommand>,
}

impl KernelHandle {
    pub async fn start(config: KernelConfig) -> Result<Self> {
        let commands = KernelExecutor::spawn(config).await?;
        Ok(Self { commands })
    }

    pub async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteOutcome> {
        let (response, rx) = oneshot::channel();
        self.send(KernelCommand::Execute { request, response }).await?;
        rx.await.map_err(|_| anyhow!("Kernel dropped the execute request"))?
    }

    pub async fn is_complete(&self, code: String) -> Result<Completeness> {
        let (response, rx) = oneshot::channel();
        self.send(KernelCommand::IsComplete { code, response }).await?;
        rx.await.map_err(|_| anyhow!("Kernel dropped the is_complete request"))
    }

    pub async fn kernel_info(&self) -> Result<KernelInfo> {
        let (response, rx) = oneshot::channel();
        self.send(KernelCommand::KernelInfo { response }).await?;
        rx.await.map_err(|_| anyhow!("Kernel dropped the kernel_info request"))
    }

    async fn send(&self, cmd: KernelCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| anyhow!("Kernel executor is not running"))
    }
}
