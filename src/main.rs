use anyhow::Result;
use argh::FromArgs;

use diary_lib::{start_service, ServiceOptions};

/// Read token-fee diary entries from the ledger.
#[derive(FromArgs)]
struct Args {
    /// wallet address to scan; defaults to the configured keypair
    #[argh(option)]
    owner: Option<String>,
    /// maximum number of signatures to page through
    #[argh(option)]
    limit: Option<usize>,
    /// pay the token fee for a fresh entry before reading
    #[argh(switch)]
    pay: bool,
    /// fetch one page of entries, print them as JSON and exit
    #[argh(switch)]
    once: bool,
}

#[tokio::main(worker_threads = 8)]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();
    start_service(ServiceOptions {
        owner: args.owner,
        page_limit: args.limit,
        pay: args.pay,
        once: args.once,
    })
    .await
}
