//! Scripted control socket standing in for a running client in tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pangolin_core::{ExitResponse, StatusSnapshot};
use pangolin_socket::{ControlReply, ControlRoute, StatusCode, serve_control_connection};
use tokio::net::UnixListener;

pub struct FakeOlm {
    path: PathBuf,
    status_calls: Arc<AtomicUsize>,
    exit_calls: Arc<AtomicUsize>,
}

impl FakeOlm {
    /// Serve `script` in order for `/status`; the last reply repeats.
    pub fn start(path: &Path, script: Vec<ControlReply>) -> Self {
        let listener = UnixListener::bind(path).unwrap();
        let status_calls = Arc::new(AtomicUsize::new(0));
        let exit_calls = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Mutex::new(script));

        let (statuses, exits) = (status_calls.clone(), exit_calls.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (statuses, exits, script) = (statuses.clone(), exits.clone(), script.clone());
                tokio::spawn(async move {
                    let _ = serve_control_connection(stream, move |route| {
                        let reply = match route {
                            ControlRoute::Status => {
                                let n = statuses.fetch_add(1, Ordering::SeqCst);
                                let script = script.lock().unwrap();
                                script
                                    .get(n)
                                    .or(script.last())
                                    .cloned()
                                    .unwrap_or_else(ControlReply::not_found)
                            }
                            ControlRoute::Exit => {
                                exits.fetch_add(1, Ordering::SeqCst);
                                ControlReply::json(&ExitResponse {
                                    status: "shutdown initiated".to_string(),
                                })
                            }
                            ControlRoute::Other { .. } => ControlReply::not_found(),
                        };
                        async move { reply }
                    })
                    .await;
                });
            }
        });

        Self {
            path: path.to_path_buf(),
            status_calls,
            exit_calls,
        }
    }

    /// Always reports the given registration state.
    pub fn registered(path: &Path, registered: bool) -> Self {
        Self::start(path, vec![status_reply(registered)])
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn exit_calls(&self) -> usize {
        self.exit_calls.load(Ordering::SeqCst)
    }
}

pub fn snapshot(registered: bool) -> StatusSnapshot {
    StatusSnapshot {
        status: "running".to_string(),
        connected: registered,
        registered,
        version: "1.4.0".to_string(),
        org_id: "org_test".to_string(),
        ..Default::default()
    }
}

pub fn status_reply(registered: bool) -> ControlReply {
    ControlReply::json(&snapshot(registered))
}

pub fn unavailable_reply(body: &str) -> ControlReply {
    ControlReply::error(StatusCode::SERVICE_UNAVAILABLE, body)
}
