use clap::{Parser, ValueHint};
use fixrs_core::{
    fix,
    fix::generated::Tags,
    SessionSettings, FixApplicationAcceptor, FixApplicationInitiator,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::naive::NaiveTime;

fn parse_duration(s: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = s.parse()?;
    Ok(std::time::Duration::from_secs(seconds))
}

fn parse_time(s: &str) -> Result<NaiveTime, chrono::format::ParseError> {
    let res = NaiveTime::parse_from_str(s, "%H:%M:%S")?;
    Ok(res)
}

#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
struct Opts {
    /// SenderCompId
    #[arg(short, long)]
    sender_comp_id: String,

    /// TargetCompId
    #[arg(short, long)]
    target_comp_id: String,

    /// Address to listen or connect
    #[arg(short, long)]
    addr: SocketAddr,

    /// Listen (opposite is connect)
    #[arg(short, long)]
    listen: bool,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Location of datastore
    #[arg(short = 'r', long, value_hint = ValueHint::FilePath)]
    store: PathBuf,

    /// Location of log files
    #[arg(short = 'o', long, value_hint = ValueHint::FilePath)]
    log: PathBuf,

    /// Unique identifier of FIX session
    #[arg(short, long, default_value = "999")]
    epoch: Arc<String>,

    /// Heartbeat timeout duration in seconds
    #[arg(long, default_value = "30", value_parser = parse_duration)]
    heartbeat_timeout: Duration,

    /// Time session should start each day in format HH:MM:SS
    #[arg(long, default_value = "23:59:59", value_parser = parse_time)]
    start: NaiveTime,
}

#[tokio::main]
async fn main() -> Result<(), fixrs_core::ApplicationError> {
    let opts = Opts::parse();
    let is_server = opts.listen;

    let settings = SessionSettings::builder()
        .with_sender_comp_id(opts.sender_comp_id.as_str())
        .with_target_comp_id(opts.target_comp_id.as_str())
        .with_socket_addr(opts.addr)
        .with_begin_string("FIX.4.2")
        .with_epoch(&opts.epoch)
        .with_store_path(opts.store.clone())
        .with_log_dir(opts.log.clone())
        .with_heartbeat_timeout(opts.heartbeat_timeout)
        .with_start_time(opts.start)
        .build()?;

    if is_server {
        let mut fix_server = FixApplicationAcceptor::build(settings)?;

        loop {
            let (fix_handle, mut event_receiver) = fix_server.accept().await?;
            let h = tokio::spawn(async move {
                let _ = fix_handle.start_async().await;
                while let Some(msg) = event_receiver.recv().await {
                    println!("got an application message: {}", msg);
                }
            });
            let _ = h.await;
        }
    } else {
        // public API in use here

        let (fix_handle, mut event_receiver) = FixApplicationInitiator::build(settings)?
            .initiate()
            .await?;

        tokio::spawn(async move {
            while let Some(msg) = event_receiver.recv().await {
                println!("got an application message: {}", msg);
            }
        });

        fix_handle.start_async().await?;

        let builder = fix::encode::MessageBuilder::new(
            fix_handle.begin_string().as_str(),
            fix::generated::MsgType::NEWS.into(),
        )
        .push(Tags::Headline, b"hello from fixrs-cli");
        fix_handle.send_message_async(builder).await?;

        fix_handle.end_async().await?;
    }

    Ok(())
}
