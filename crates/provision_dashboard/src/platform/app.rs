use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use futures_util::stream;
use provision_core::{ActivityQuery, AggregateCounts, Notification};
use provision_engine::{
    NotificationSink, ReconnectSettings, StreamTransport, Subscription, Target, Tracker,
    TrackerSettings, TransportError, TransportHandle, Update,
};
use tokio::sync::mpsc;
use tracker_logging::{tracker_info, tracker_warn};

use super::config::{self, DashboardConfig};
use super::input::{self, Input};
use super::{logging, render};

/// Prints notifications as banner lines on stdout.
struct PrintingSink;

impl NotificationSink for PrintingSink {
    fn deliver(&self, notification: &Notification) {
        println!("{}", render::notification_line(notification));
    }
}

pub fn run_app() -> anyhow::Result<()> {
    let config_path = config::config_path();
    let (config, problem) = config::load(&config_path);
    logging::initialize(
        config.log.destination,
        config.log.level_filter(),
        &config.log.file,
    );
    config::report(&config_path, problem.as_deref());

    let tracker = Arc::new(Tracker::new(TrackerSettings::from(&config.tracker)));
    tracker.add_notification_sink(Arc::new(PrintingSink));
    let subscriptions = watch_dashboard(&tracker);

    let console = Arc::new(Console::new(Arc::clone(&tracker), subscriptions));
    let (input_tx, input_rx) = mpsc::unbounded_channel::<Input>();
    let frames = stream::unfold(
        (input_rx, Arc::clone(&console)),
        |(mut rx, console)| async move {
            while let Some(input) = rx.recv().await {
                match input {
                    Input::Frame(frame) => {
                        return Some((Ok::<_, TransportError>(frame), (rx, console)));
                    }
                    command => console.run(command),
                }
            }
            None
        },
    );
    let handle = TransportHandle::spawn(
        StreamTransport::new(Box::pin(frames)),
        Arc::clone(&tracker),
        ReconnectSettings::from(&config.reconnect),
    );

    for line in io::stdin().lock().lines() {
        let line = line.context("reading dashboard input")?;
        let input = input::parse_line(&line);
        if matches!(input, Input::Blank) {
            continue;
        }
        if input_tx.send(input).is_err() {
            tracker_warn!("event transport stopped; ignoring remaining input");
            break;
        }
    }

    drop(input_tx);
    let pump = handle.join().context("event transport failed")?;
    tracker_info!(
        "input closed after {} frames ({} malformed)",
        pump.frames,
        pump.malformed
    );

    console.close();
    print_summary(&tracker, &config);
    Ok(())
}

/// Runs commands on the pump thread, so each one sees every frame that was
/// typed before it.
struct Console {
    tracker: Arc<Tracker>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Console {
    fn new(tracker: Arc<Tracker>, subscriptions: Vec<Subscription>) -> Self {
        Self {
            tracker,
            subscriptions: Mutex::new(subscriptions),
        }
    }

    fn run(&self, command: Input) {
        match command {
            Input::Register(contract) => {
                let job_id = contract.job_id.clone();
                match self.tracker.register(contract) {
                    Ok(snapshot) => {
                        let watch = watch_job(&self.tracker, &job_id);
                        if let Ok(mut subscriptions) = self.subscriptions.lock() {
                            subscriptions.push(watch);
                        }
                        println!("{}", render::job_line(&snapshot));
                    }
                    Err(err) => {
                        tracker_warn!("register rejected job_id={}: {}", job_id, err);
                        eprintln!("register {}: {}", job_id, err);
                    }
                }
            }
            Input::Remove(job_id) => self.tracker.remove_job(&job_id),
            Input::Reset(job_id) => match self.tracker.reset_job(&job_id) {
                Ok(snapshot) => println!("{}", render::job_line(&snapshot)),
                Err(err) => eprintln!("reset {}: {}", job_id, err),
            },
            Input::Frame(_) | Input::Blank => {}
        }
    }

    fn close(&self) {
        if let Ok(subscriptions) = self.subscriptions.lock() {
            for subscription in subscriptions.iter() {
                subscription.unsubscribe();
            }
        }
    }
}

/// Live output: activity lines as they arrive and the header whenever the
/// counts change.
fn watch_dashboard(tracker: &Tracker) -> Vec<Subscription> {
    let activity = tracker.subscribe(Target::Activity, |update: &Update| {
        if let Update::Activity(entries) = update {
            for entry in entries.iter().rev() {
                println!("{}", render::activity_line(entry));
            }
        }
    });

    let last_counts = Mutex::new(AggregateCounts::default());
    let counts = tracker.subscribe(Target::AllJobs, move |update: &Update| {
        let Update::Counts(counts) = update else {
            return;
        };
        if let Ok(mut last) = last_counts.lock() {
            if *last != *counts {
                *last = *counts;
                println!("{}", render::counts_line(counts));
            }
        }
    });

    vec![activity, counts]
}

fn watch_job(tracker: &Tracker, job_id: &str) -> Subscription {
    tracker.subscribe(job_id, |update: &Update| match update {
        Update::Job(snapshot) => println!("{}", render::job_line(snapshot)),
        Update::JobRemoved(job_id) => println!("{} removed", job_id),
        _ => {}
    })
}

fn print_summary(tracker: &Tracker, config: &DashboardConfig) {
    let activity = tracker.get_activity(
        &ActivityQuery::default()
            .within(config.activity_window())
            .limit(config.activity_rows),
    );
    let lines = render::summary(
        &tracker.list_jobs(),
        &tracker.counts(),
        &activity,
        &tracker.diagnostics(),
    );
    println!();
    for line in lines {
        println!("{}", line);
    }
}
