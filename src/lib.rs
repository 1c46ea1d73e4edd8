//! Sommelier, a nested Wayland compositor-proxy.
//!
//! Sommelier sits between Wayland clients running inside a VM or container
//! and a host compositor outside of it. It listens on a Wayland socket of
//! its own, forwards every request from guest clients to the host as the
//! corresponding client-side request, and forwards host events back, while
//! translating between the coordinate spaces, buffer-sharing formats and
//! windowing conventions of the two worlds.
//!
//! When started in X11 mode, sommelier additionally spawns a rootless
//! Xwayland server and acts as its window manager, pairing every X11
//! toplevel with an xdg/aura toplevel on the host and bridging the X11
//! selection with the host clipboard.
//!
//! The crate is organised around a single [`context::Context`] owning all
//! state, mutated exclusively from callbacks dispatched by one
//! [`calloop`] event loop:
//!
//! - host-side protocol traffic is handled through [`wayland_client`]
//!   `Dispatch` impls, guest-side traffic through [`wayland_server`]
//!   `Dispatch`/`GlobalDispatch` impls;
//! - [`transform`] implements the virtual/logical coordinate mapping;
//! - [`xwm`] contains the X11 window manager and the clipboard bridge.

#![warn(missing_debug_implementations)]

pub mod aura_shell;
pub mod compositor;
pub mod config;
pub mod context;
pub mod data_device;
pub mod drm;
pub mod explicit_sync;
pub mod fractional_scale;
pub mod globals;
pub mod idle_inhibit;
pub mod linux_dmabuf;
pub mod output;
pub mod pointer_constraints;
pub mod relative_pointer;
pub mod seat;
pub mod shm;
pub mod stylus;
pub mod subcompositor;
pub mod text_input;
pub mod touch_recorder;
pub mod transform;
pub mod viewporter;
pub mod xdg_shell;
pub mod xwm;
