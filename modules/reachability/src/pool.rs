use crate::{ProbeJob, Prober};
use audit_core::{ServerStatus, StatusMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn, Instrument};

/// Run `jobs` on a fixed pool of `concurrency` workers and collect one status per job.
///
/// Both channels are sized to the job count, so enqueueing never waits on a worker and workers
/// never wait on the driver. The driver drains exactly as many results as it enqueued jobs.
pub async fn run_pool<P: Prober>(prober: Arc<P>, jobs: Vec<ProbeJob>, concurrency: usize) -> Vec<ServerStatus> {
    let total = jobs.len();
    if total == 0 {
        return Vec::new();
    }
    let (job_tx, job_rx) = mpsc::channel::<ProbeJob>(total);
    let (res_tx, mut res_rx) = mpsc::channel::<ServerStatus>(total);
    let job_rx = Arc::new(Mutex::new(job_rx));

    let workers = concurrency.max(1);
    debug!(total, workers, "starting probe workers");
    for id in 0..workers {
        let span = tracing::debug_span!("probe_worker", worker = id);
        tokio::spawn(worker(prober.clone(), job_rx.clone(), res_tx.clone()).instrument(span));
    }
    drop(res_tx);

    for job in jobs {
        if job_tx.send(job).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        match res_rx.recv().await {
            Some(status) => {
                debug!(
                    server_name = %status.server_name,
                    port = status.port,
                    status = ?status.status_code,
                    current = out.len() + 1,
                    total,
                    "got server status"
                );
                out.push(status);
            }
            None => break,
        }
    }
    if out.len() < total {
        warn!(received = out.len(), total, "probe workers exited before all results were delivered");
    }
    out
}

async fn worker<P: Prober>(
    prober: Arc<P>,
    jobs: Arc<Mutex<mpsc::Receiver<ProbeJob>>>,
    results: mpsc::Sender<ServerStatus>,
) {
    loop {
        let next = { jobs.lock().await.recv().await };
        let Some(job) = next else { break };
        let status = run_job(prober.as_ref(), job).await;
        if results.send(status).await.is_err() {
            break;
        }
    }
}

async fn run_job<P: Prober>(prober: &P, job: ProbeJob) -> ServerStatus {
    match u16::try_from(job.port) {
        Ok(port) => prober.probe(&job.server_name, port).await,
        Err(e) => {
            warn!(server_name = %job.server_name, port = job.port, error = %e, "failed to convert port to int");
            ServerStatus {
                server_name: job.server_name,
                port: 0,
                status_code: None,
                status_message: StatusMessage::Invalid(format!("failed to convert port to int: {e}")),
            }
        }
    }
}
