use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bus::{Bus, DragCommand, DragEvent, HandlerBox};
use core_types::{ContextId, Point, SessionId};
use dnd_core::{
    AllowedOperations, ChannelHandler, ContextDescriptor, DragConfig, DragPhase, HandlerRequest,
    NoopHandler, OperationKind, Payload, RemoteContextEndpoint, SessionView,
};
use mimalloc::MiMalloc;
use runtime_dnd::start_dnd_runtime;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const PAGE: u64 = 1;
const REMOTE_PROCESS: u32 = 2;
const QUIET: Duration = Duration::from_millis(100);

fn origin(url: &str) -> url::Origin {
    url::Url::parse(url).map_or_else(|_| url::Origin::new_opaque(), |url| url.origin())
}

fn load_config() -> DragConfig {
    let Some(path) = std::env::args().nth(1) else {
        return DragConfig::default();
    };
    let parsed = std::fs::read_to_string(&path)
        .map_err(|err| err.to_string())
        .and_then(|text| DragConfig::from_toml_str(&text).map_err(|err| err.to_string()));
    match parsed {
        Ok(config) => config,
        Err(err) => {
            log::warn!("ignoring {path}: {err}");
            DragConfig::default()
        }
    }
}

/// A document script that accepts drops with `Move` while the pointer is over it.
fn spawn_script(requests: mpsc::Receiver<HandlerRequest>) {
    thread::spawn(move || {
        while let Ok(request) = requests.recv() {
            let answer = match request.phase {
                DragPhase::Enter | DragPhase::Over if request.view.has_type("text/uri-list") => {
                    Some(OperationKind::Move)
                }
                _ => None,
            };
            request.respond(answer);
        }
    });
}

/// Pumps runtime events until it goes quiet, playing the remote process's part.
fn drain(bus: &Bus, remote: &mut RemoteContextEndpoint) -> Option<SessionId> {
    let mut started = None;
    while let Ok(event) = bus.evt_rx.recv_timeout(QUIET) {
        match event {
            DragEvent::GestureStarted { session, .. } => {
                println!("started   {session}");
                started = Some(session);
            }
            DragEvent::GestureRejected { error, .. } => println!("rejected  {error}"),
            DragEvent::OperationFeedback {
                context, operation, ..
            } => println!("cursor    {operation:<5} over {context}"),
            DragEvent::GestureFinished { session, operation } => {
                println!("finished  {session} -> {operation}");
                if operation.is_destructive() {
                    println!("          source content is removed");
                }
            }
            DragEvent::RemoteOutbound { process, bytes } => match remote.receive(&bytes) {
                Ok(replies) => {
                    for reply in replies {
                        let _ = bus.cmd_tx.send(DragCommand::RemoteMessage {
                            process,
                            bytes: reply,
                        });
                    }
                }
                Err(err) => log::warn!("remote process {process}: {err}"),
            },
            DragEvent::CommandFailed { error } => println!("failed    {error}"),
        }
    }
    started
}

fn main() {
    env_logger::init();
    let config = load_config();

    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    let runtime = start_dnd_runtime(cmd_rx, evt_tx.clone(), config.clone());
    let bus = Bus {
        cmd_tx,
        evt_rx,
        evt_tx,
    };

    let source = ContextId::from_raw(1);
    let scripted = ContextId::from_raw(2);
    let remote = ContextId::from_raw(3);

    let (script_tx, script_rx) = mpsc::channel();
    spawn_script(script_rx);
    let mut endpoint = RemoteContextEndpoint::new();
    endpoint.attach(
        remote,
        Box::new(|phase: DragPhase, _: ContextId, _: &SessionView| {
            phase.accepts_operation().then_some(OperationKind::Link)
        }),
    );

    let commands = [
        DragCommand::AttachContext {
            descriptor: ContextDescriptor::new(source, PAGE, origin("https://news.example/")),
            handler: HandlerBox(Box::new(NoopHandler)),
        },
        DragCommand::AttachContext {
            descriptor: ContextDescriptor::new(scripted, PAGE, origin("https://board.example/")),
            handler: HandlerBox(Box::new(ChannelHandler::new(script_tx, config.handler_timeout()))),
        },
        DragCommand::AttachRemoteContext {
            descriptor: ContextDescriptor::new(remote, PAGE, origin("https://ads.example/")),
            process: REMOTE_PROCESS,
        },
        DragCommand::BeginGesture {
            page: PAGE,
            request_id: 1,
            payload: Payload::url("https://news.example/story"),
            allowed: AllowedOperations::ALL,
            origin_context: source,
        },
    ];
    for command in commands {
        let _ = bus.cmd_tx.send(command);
    }
    let Some(session) = drain(&bus, &mut endpoint) else {
        eprintln!("gesture did not start");
        return;
    };

    let walk = [(source, 5.0), (scripted, 120.0), (remote, 260.0), (scripted, 140.0)];
    for (context, x) in walk {
        let _ = bus.cmd_tx.send(DragCommand::ReportPosition {
            session,
            context,
            point: Point::new(x, 40.0),
        });
        drain(&bus, &mut endpoint);
    }

    let _ = bus.cmd_tx.send(DragCommand::ReportRelease { session });
    drain(&bus, &mut endpoint);

    drop(bus);
    let _ = runtime.join();
}
