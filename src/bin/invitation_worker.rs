//! Invitation worker: delivers payment links and single-use invites.

use plataforma_workers::consumer;
use plataforma_workers::logger::{self, LogTag};
use plataforma_workers::messages::queues;

#[tokio::main]
async fn main() {
    logger::init();
    if let Err(err) = consumer::run_worker("invitation_worker", queues::INVITATION).await {
        logger::error(LogTag::System, &format!("invitation_worker failed: {:#}", err));
        std::process::exit(1);
    }
}
