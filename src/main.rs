//! spindle demo CLI
//!
//! - `spindle read <PATH>`: read consecutive chunks of a file from several
//!   tasks at once, polling each read between yields
//! - `spindle chain`: tasks that spawn each other while yielding around the ring

use clap::{Parser, Subcommand};
use spindle::fs::{File, PosixAio, SimulatedReads};
use spindle::{Error, ReadFacility, ReadRequest, Runtime, Scheduler, read_polled};
use std::cell::RefCell;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::{Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spindle")]
#[command(about = "Cooperative fiber runtime demos", long_about = None)]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a file in chunks, one task per chunk
    Read {
        /// File to read
        path: PathBuf,
        /// Number of reading tasks
        #[arg(short, long, default_value_t = 3)]
        tasks: usize,
        /// Bytes read by each task
        #[arg(short, long, default_value_t = 1024)]
        chunk: usize,
        /// Use simulated reads completing after this many polls
        #[arg(long)]
        simulated: Option<usize>,
    },

    /// Run tasks that spawn each other up to a depth
    Chain {
        /// Highest task id to spawn
        #[arg(short, long, default_value_t = 20)]
        depth: u32,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(level));

    Registry::default().with(layer).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Read {
            path,
            tasks,
            chunk,
            simulated,
        } => match simulated {
            Some(latency) => read_chunks(&path, tasks, chunk, SimulatedReads::new(latency)),
            None => read_chunks(&path, tasks, chunk, PosixAio),
        },
        Commands::Chain { depth } => chain(depth),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

type ChunkResults = Rc<RefCell<Vec<Option<Result<Vec<u8>, Error>>>>>;

fn read_chunks<F>(path: &Path, tasks: usize, chunk: usize, facility: F) -> Result<(), Error>
where
    F: ReadFacility + Copy + 'static,
{
    let file = File::open(path)?;
    let fd = file.as_raw_fd();

    let results: ChunkResults = Rc::new(RefCell::new((0..tasks).map(|_| None).collect()));
    let mut rt = Runtime::new();

    for index in 0..tasks {
        let results = results.clone();
        let request = ReadRequest::new(fd, (index * chunk) as u64, chunk);

        rt.spawn(move |scheduler| {
            let outcome = read_polled(scheduler, &facility, request);
            match &outcome {
                Ok(bytes) => println!("result {index} = {}", bytes.len()),
                Err(error) => println!("result {index} = {error}"),
            }
            results.borrow_mut()[index] = Some(outcome);
            Ok(())
        })?;
    }

    rt.run()?;
    drop(file);

    let mut contents = Vec::with_capacity(tasks * chunk);
    for outcome in results.borrow_mut().drain(..) {
        if let Some(Ok(bytes)) = outcome {
            contents.extend_from_slice(&bytes);
        }
    }

    println!("{}", String::from_utf8_lossy(&contents));
    println!("End tasks");

    Ok(())
}

fn chain(depth: u32) -> Result<(), Error> {
    let mut rt = Runtime::new();
    rt.spawn(move |scheduler| stepper(scheduler, 0, depth))?;
    rt.run()
}

fn stepper(scheduler: &Scheduler, id: u32, depth: u32) -> Result<(), Error> {
    println!("step one; id = {id}");
    if id < depth {
        println!("add_task id = {id}; new task id = {}", id + 1);
        scheduler.spawn(move |scheduler| spawner(scheduler, id + 1, depth))?;
    }
    scheduler.yield_now()?;
    println!("step two; id = {id}");
    scheduler.yield_now()?;
    println!("step three; id = {id}");
    scheduler.yield_now()?;
    scheduler.end_task();
    println!("finish stepper {id}");
    Ok(())
}

fn spawner(scheduler: &Scheduler, id: u32, depth: u32) -> Result<(), Error> {
    println!("make spawner {id}");
    scheduler.yield_now()?;
    if id < depth {
        scheduler.spawn(move |scheduler| stepper(scheduler, id + 1, depth))?;
        println!("spawner; push stepper id = {}", id + 1);
        scheduler.yield_now()?;
    }
    scheduler.end_task();
    println!("finish spawner {id}");
    Ok(())
}
