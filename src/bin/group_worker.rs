//! Group worker: creates managed channels for clients.

use plataforma_workers::consumer;
use plataforma_workers::logger::{self, LogTag};
use plataforma_workers::messages::queues;

#[tokio::main]
async fn main() {
    logger::init();
    if let Err(err) = consumer::run_worker("group_worker", queues::GROUP_CREATION).await {
        logger::error(LogTag::System, &format!("group_worker failed: {:#}", err));
        std::process::exit(1);
    }
}
