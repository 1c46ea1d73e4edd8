//! Sommelier entry point: wire the host connection, the guest socket, the
//! optional Xwayland server and all auxiliary fds into one event loop.

use std::io::ErrorKind;
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::Context as _;
use calloop::generic::Generic;
use calloop::signals::{Signal, Signals};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, Interest, Mode, PostAction};
use calloop_wayland_source::WaylandSource;
use clap::Parser;
use wayland_client::Connection;
use wayland_server::{Display, ListeningSocket};

use sommelier::config::{Cli, Config};
use sommelier::context::{guest_client_data, Context};
use sommelier::xwm::{self, Xwm};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;
    run(config)
}

fn run(config: Config) -> anyhow::Result<()> {
    // Host side.
    if let Some(display) = &config.display {
        std::env::set_var("WAYLAND_DISPLAY", display);
    }
    let connection = Connection::connect_to_env().context("connecting to host compositor")?;
    let mut event_queue = connection.new_event_queue();
    let qh = event_queue.handle();

    // Guest side.
    let mut display: Display<Context> = Display::new().context("creating guest display")?;
    let display_handle = display.handle();
    let socket = ListeningSocket::bind(config.socket.as_str())
        .with_context(|| format!("binding guest socket {}", config.socket))?;
    log::info!("listening on {}", config.socket);

    let mut event_loop: EventLoop<Context> =
        EventLoop::try_new().context("creating event loop")?;
    let loop_handle = event_loop.handle();

    let x11_mode = config.x11;
    let mut ctx = Context::new(
        config,
        connection.clone(),
        qh.clone(),
        display_handle.clone(),
        loop_handle.clone(),
    );

    // Populate the host registry before any guest can connect, so the
    // advertised globals reflect what the host really has.
    let registry = connection.display().get_registry(&qh, ());
    ctx.registry = Some(registry);
    event_queue.roundtrip(&mut ctx).context("initial host roundtrip")?;
    event_queue.roundtrip(&mut ctx).context("initial host roundtrip")?;

    WaylandSource::new(connection.clone(), event_queue)
        .insert(loop_handle.clone())
        .map_err(|err| anyhow::anyhow!("inserting host source: {}", err))?;

    // Guest clients: the listening socket plus display dispatch. The
    // source polls a duplicate of the socket fd; the socket itself lives
    // in the callback.
    let socket_fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(socket.as_raw_fd()) }
        .try_clone_to_owned()?;
    loop_handle
        .insert_source(
            Generic::new(socket_fd, Interest::READ, Mode::Level),
            move |_, _, ctx: &mut Context| {
                while let Some(stream) = socket.accept()? {
                    if let Err(err) =
                        ctx.display_handle.insert_client(stream, guest_client_data())
                    {
                        log::warn!("inserting guest client failed: {}", err);
                    }
                }
                Ok(PostAction::Continue)
            },
        )
        .map_err(|err| anyhow::anyhow!("inserting socket source: {}", err))?;

    let display_poll_fd = display.backend().poll_fd().try_clone_to_owned()?;
    loop_handle
        .insert_source(
            Generic::new(display_poll_fd, Interest::READ, Mode::Level),
            move |_, _, ctx: &mut Context| {
                display.dispatch_clients(ctx).map_err(std::io::Error::other)?;
                ctx.display_handle.flush_clients().ok();
                Ok(PostAction::Continue)
            },
        )
        .map_err(|err| anyhow::anyhow!("inserting display source: {}", err))?;

    // Signals: reap Xwayland, dump stats on SIGUSR1.
    loop_handle
        .insert_source(
            Signals::new(&[Signal::SIGCHLD, Signal::SIGUSR1])?,
            |event, _, ctx: &mut Context| match event.signal() {
                Signal::SIGCHLD => {
                    let died = ctx
                        .xwm
                        .as_mut()
                        .and_then(|x| x.xwayland.as_mut())
                        .and_then(|child| child.try_wait().ok().flatten());
                    if let Some(status) = died {
                        log::error!("Xwayland exited: {}", status);
                        std::process::exit(1);
                    }
                }
                Signal::SIGUSR1 => {
                    log::info!(
                        "state: {} outputs, {} seats, {} surfaces, {} windows",
                        ctx.outputs.len(),
                        ctx.seats.len(),
                        ctx.surfaces.len(),
                        ctx.xwm.as_ref().map(|x| x.windows.len()).unwrap_or(0)
                    );
                }
                _ => {}
            },
        )
        .map_err(|err| anyhow::anyhow!("inserting signal source: {}", err))?;

    if let Some(interval) = ctx.config.stats_timer {
        let timer = Timer::from_duration(Duration::from_secs(interval as u64));
        loop_handle
            .insert_source(timer, move |_, _, ctx: &mut Context| {
                log::info!(
                    "stats: {} surfaces, {} windows",
                    ctx.surfaces.len(),
                    ctx.xwm.as_ref().map(|x| x.windows.len()).unwrap_or(0)
                );
                TimeoutAction::ToDuration(Duration::from_secs(interval as u64))
            })
            .map_err(|err| anyhow::anyhow!("inserting stats timer: {}", err))?;
    }

    if x11_mode {
        spawn_xwayland(&mut ctx)?;
    }

    log::info!("sommelier running");
    let result = event_loop.run(None, &mut ctx, |ctx| {
        xwm_dispatch_if_ready(ctx);
        ctx.flush();
    });

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            // A dead host connection is a normal shutdown: flush whatever
            // guests still have queued and leave quietly.
            let io_kind = std::error::Error::source(&err)
                .and_then(|s| s.downcast_ref::<std::io::Error>())
                .map(|io| io.kind());
            if matches!(io_kind, Some(ErrorKind::BrokenPipe | ErrorKind::ConnectionReset)) {
                log::info!("host connection closed");
                Ok(())
            } else {
                Err(err.into())
            }
        }
    }
}

// The X11 source only exists once Xwayland announced its display, so late
// dispatch is routed through the idle callback as well.
fn xwm_dispatch_if_ready(ctx: &mut Context) {
    if ctx.xwm.is_some() {
        if let Err(err) = xwm::dispatch_x11_events(ctx) {
            log::error!("X11 connection lost: {}", err);
            std::process::exit(1);
        }
    }
}

/// Spawn a rootless Xwayland connected to our own guest socket, wait for
/// the display number on the displayfd pipe, then connect the window
/// manager.
fn spawn_xwayland(ctx: &mut Context) -> anyhow::Result<()> {
    let (read_fd, write_fd) = rustix::pipe::pipe().context("creating displayfd pipe")?;
    // The write end is inherited by Xwayland; clear CLOEXEC on it only.
    rustix::io::fcntl_setfd(&read_fd, rustix::io::FdFlags::CLOEXEC)?;

    let config = &ctx.config;
    let mut command = Command::new(&config.xwayland_path);
    if let Some(display) = config.x_display {
        command.arg(format!(":{}", display));
    }
    command.arg("-rootless").arg("-displayfd").arg(write_fd.as_raw_fd().to_string());
    if let Some(auth) = &config.x_auth {
        command.arg("-auth").arg(auth);
    }
    if let Some(font_path) = &config.x_font_path {
        command.arg("-fp").arg(font_path);
    }
    if !config.glamor {
        command.env("XWAYLAND_NO_GLAMOR", "1");
    }
    command.env("WAYLAND_DISPLAY", &config.socket);
    if let Some(gl_path) = &config.xwayland_gl_driver_path {
        command.env("LD_LIBRARY_PATH", gl_path);
    }
    command.stdin(Stdio::null());

    let write_raw = write_fd.as_raw_fd();
    unsafe {
        command.pre_exec(move || {
            // Keep the displayfd pipe open across exec.
            rustix::io::fcntl_setfd(
                std::os::fd::BorrowedFd::borrow_raw(write_raw),
                rustix::io::FdFlags::empty(),
            )?;
            Ok(())
        });
    }

    let child: Child = command.spawn().context("spawning Xwayland")?;
    drop(write_fd);
    log::info!("spawned Xwayland (pid {})", child.id());

    let mut pending_child = Some(child);
    ctx.loop_handle
        .insert_source(
            Generic::new(read_fd, Interest::READ, Mode::Level),
            move |_, fd, ctx: &mut Context| {
                let mut buffer = [0u8; 16];
                let read = match rustix::io::read(fd.as_fd(), &mut buffer) {
                    Ok(read) => read,
                    Err(rustix::io::Errno::AGAIN) => return Ok(PostAction::Continue),
                    Err(err) => {
                        log::error!("reading displayfd failed: {}", err);
                        std::process::exit(1);
                    }
                };
                if read == 0 {
                    log::error!("Xwayland closed displayfd before announcing a display");
                    std::process::exit(1);
                }
                let number: String = buffer[..read]
                    .iter()
                    .map(|&b| b as char)
                    .filter(|c| c.is_ascii_digit())
                    .collect();
                let display = format!(":{}", number);
                log::info!("Xwayland ready on {}", display);
                match Xwm::connect(&display) {
                    Ok(mut xwm) => {
                        xwm.xwayland = pending_child.take();
                        let x11_fd = xwm
                            .conn
                            .stream()
                            .as_fd()
                            .try_clone_to_owned()
                            .map_err(std::io::Error::other)?;
                        std::env::set_var("DISPLAY", &display);
                        ctx.xwm = Some(xwm);
                        insert_x11_source(ctx, x11_fd);
                        // Catch up on anything that happened during setup.
                        xwm_dispatch_if_ready(ctx);
                    }
                    Err(err) => {
                        log::error!("connecting to Xwayland failed: {}", err);
                        std::process::exit(1);
                    }
                }
                Ok(PostAction::Remove)
            },
        )
        .map_err(|err| anyhow::anyhow!("inserting displayfd source: {}", err))?;
    Ok(())
}

fn insert_x11_source(ctx: &mut Context, fd: std::os::fd::OwnedFd) {
    let result = ctx.loop_handle.insert_source(
        Generic::new(fd, Interest::READ, Mode::Level),
        |_, _, ctx: &mut Context| {
            if let Err(err) = xwm::dispatch_x11_events(ctx) {
                log::error!("X11 connection lost: {}", err);
                std::process::exit(1);
            }
            Ok(PostAction::Continue)
        },
    );
    if let Err(err) = result {
        log::error!("inserting X11 source failed: {}", err);
        std::process::exit(1);
    }
}
