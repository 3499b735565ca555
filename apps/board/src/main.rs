use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use poll_core::{display, sms, ChannelNames, PollController, PollEvent};
use realtime::{Channel, Connection, MemoryRealtime, StaticTokenProvider};
use shared::{
    domain::{Question, Tally},
    protocol::{self, Envelope, SmsPayload},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod config;

use config::{load_question, load_settings};

#[derive(Parser, Debug)]
struct Args {
    /// TOML file with the question text and options.
    #[arg(long, default_value = "question.toml")]
    question: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let settings = load_settings();
    let question = load_question(&args.question)?;

    let connection = MemoryRealtime::connect(&StaticTokenProvider::new("local-dev"))
        .await
        .context("failed to authorize transport")?;
    let names = ChannelNames {
        votes: settings.vote_channel.clone(),
        status: settings.status_channel.clone(),
    };
    let controller = PollController::mount(&*connection, question.clone(), names.clone())
        .await
        .context("failed to mount poll")?;
    info!(
        votes = %names.votes,
        status = %names.status,
        "poll mounted; type `<from>: <text>` to feed an inbound SMS, ctrl-d to quit"
    );
    render(&question, &controller.tally());

    let mut events = controller.subscribe_events();
    tokio::spawn({
        let question = question.clone();
        async move {
            while let Ok(PollEvent::VoteAccepted { event, tally }) = events.recv().await {
                let (day, time) = sms::format_received(event.received_at);
                info!(
                    from = %sms::format_sender(&event.sender),
                    day = %day,
                    time = %time,
                    key = %event.normalized,
                    "vote received"
                );
                render(&question, &tally);
            }
        }
    });

    let vote_channel = connection.channel(&names.votes);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (from, text) = match line.split_once(':') {
            Some((from, text)) => (from.trim(), text.trim()),
            None => ("447700900123", line),
        };
        if from.is_empty() {
            warn!("expected `<from>: <text>`");
            continue;
        }
        let payload = SmsPayload {
            from: from.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            text: Some(text.to_string()),
        };
        vote_channel
            .publish(Envelope::new(protocol::SMS_EVENT, &payload)?)
            .await
            .context("failed to publish vote")?;
    }

    controller.unmount();
    Ok(())
}

fn render(question: &Question, tally: &Tally) {
    println!();
    println!("{}  ({} votes)", question.text(), tally.total());
    for row in display::bar_rows(question, tally) {
        let bar = "#".repeat(usize::from(row.percentage / 4));
        println!(
            "  {}  {:<20} {:>4}  {:>3}%  {}",
            row.key, row.text, row.count, row.percentage, bar
        );
    }
}
