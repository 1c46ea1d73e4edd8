//! Command-line and environment configuration.
//!
//! Every option is available as a `--flag` and as a `SOMMELIER_*`
//! environment variable; the command line takes precedence. Parsing of the
//! raw options into the validated [`Config`] happens once at startup, and
//! the result is owned by the context for the lifetime of the process.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use thiserror::Error;
use xkbcommon::xkb;

/// Smallest accepted `--scale` value.
pub const MIN_SCALE: f64 = 0.1;
/// Largest accepted `--scale` value.
pub const MAX_SCALE: f64 = 10.0;

bitflags::bitflags! {
    /// Modifier set of an accelerator chord.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifiers: u32 {
        const CONTROL = 1 << 0;
        const ALT = 1 << 1;
        const SHIFT = 1 << 2;
    }
}

/// A reserved key chord. Key presses matching an accelerator are swallowed
/// by the keyboard forwarder so the host compositor can act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accelerator {
    /// Required modifier state.
    pub modifiers: Modifiers,
    /// Lower-cased keysym completing the chord.
    pub symbol: xkb::Keysym,
}

/// Errors produced while validating the raw options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An accelerator string did not follow the `<Mod><Mod>Key` grammar.
    #[error("invalid accelerator {0:?}")]
    InvalidAccelerator(String),
    /// An accelerator named a keysym that xkb does not know.
    #[error("unknown keysym {0:?} in accelerator")]
    UnknownKeysym(String),
    /// A frame color was not of the form `#rrggbb`.
    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),
}

/// Behaviour of host fullscreen surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FullscreenMode {
    /// System UI (e.g. the shelf) stays reachable at the screen edge.
    Immersive,
    /// Plain fullscreen without easy access to system UI.
    Plain,
}

/// Raw command-line options, mirrored one-to-one from the flag surface.
#[derive(Debug, Parser)]
#[command(
    name = "sommelier",
    about = "Nested Wayland compositor-proxy for VM guests and X11 applications",
    version
)]
pub struct Cli {
    /// Name of the Wayland server socket to listen on.
    #[arg(long, env = "SOMMELIER_SOCKET", default_value = "wayland-0")]
    pub socket: String,

    /// Host Wayland display to connect to (defaults to $WAYLAND_DISPLAY).
    #[arg(long, env = "SOMMELIER_DISPLAY")]
    pub display: Option<String>,

    /// Virtual-to-logical scale factor.
    #[arg(long, env = "SOMMELIER_SCALE", default_value_t = 1.0)]
    pub scale: f64,

    /// Derive per-axis scale factors from xdg_output instead of a single
    /// context-wide scale.
    #[arg(long = "direct-scale", env = "SOMMELIER_DIRECT_SCALE")]
    pub direct_scale: bool,

    /// Preferred DPI buckets, the nearest of which is used to synthesise
    /// physical output dimensions.
    #[arg(long, env = "SOMMELIER_DPI", value_delimiter = ',')]
    pub dpi: Vec<i32>,

    /// Enable X11 mode: spawn Xwayland and act as its window manager.
    #[arg(short = 'X', long = "x11")]
    pub x11: bool,

    /// X display number to use for Xwayland (e.g. 1 for :1).
    #[arg(long = "x-display", env = "SOMMELIER_X_DISPLAY")]
    pub x_display: Option<u32>,

    /// Path to the Xwayland executable.
    #[arg(
        long = "xwayland-path",
        env = "SOMMELIER_XWAYLAND_PATH",
        default_value = "/usr/bin/Xwayland"
    )]
    pub xwayland_path: PathBuf,

    /// Directory to prepend to $LD_LIBRARY_PATH when spawning Xwayland.
    #[arg(long = "xwayland-gl-driver-path", env = "SOMMELIER_XWAYLAND_GL_DRIVER_PATH")]
    pub xwayland_gl_driver_path: Option<PathBuf>,

    /// X authority file passed to Xwayland.
    #[arg(long = "x-auth", env = "SOMMELIER_X_AUTH")]
    pub x_auth: Option<PathBuf>,

    /// Font path passed to Xwayland.
    #[arg(long = "x-font-path", env = "SOMMELIER_X_FONT_PATH")]
    pub x_font_path: Option<String>,

    /// Key chords reserved for the host, e.g. `<Control><Alt>Delete,<Alt>F4`.
    #[arg(long, env = "SOMMELIER_ACCELERATORS")]
    pub accelerators: Option<String>,

    /// Key chords reserved for the host only while windowed.
    #[arg(long = "windowed-accelerators", env = "SOMMELIER_WINDOWED_ACCELERATORS")]
    pub windowed_accelerators: Option<String>,

    /// Fixed application id to label every surface with.
    #[arg(long = "application-id", env = "SOMMELIER_APPLICATION_ID")]
    pub application_id: Option<String>,

    /// VM identifier used when deriving application ids.
    #[arg(long = "vm-identifier", env = "SOMMELIER_VM_IDENTIFIER", default_value = "termina")]
    pub vm_identifier: String,

    /// Name of a cardinal X11 window property overriding application-id
    /// derivation.
    #[arg(
        long = "application-id-x11-property",
        env = "SOMMELIER_APPLICATION_ID_X11_PROPERTY"
    )]
    pub application_id_x11_property: Option<String>,

    /// Window frame color, `#rrggbb`.
    #[arg(long = "frame-color", env = "SOMMELIER_FRAME_COLOR", default_value = "#f2f2f2")]
    pub frame_color: String,

    /// Window frame color for dark themes, `#rrggbb`.
    #[arg(
        long = "dark-frame-color",
        env = "SOMMELIER_DARK_FRAME_COLOR",
        default_value = "#323639"
    )]
    pub dark_frame_color: String,

    /// Fullscreen behaviour requested from the host.
    #[arg(
        long = "fullscreen-mode",
        env = "SOMMELIER_FULLSCREEN_MODE",
        value_enum,
        default_value_t = FullscreenMode::Immersive
    )]
    pub fullscreen_mode: FullscreenMode,

    /// Advertise zwp_linux_dmabuf to guest clients.
    #[arg(long = "enable-linux-dmabuf", env = "SOMMELIER_ENABLE_LINUX_DMABUF")]
    pub enable_linux_dmabuf: bool,

    /// Honor the X shape extension on guest windows.
    #[arg(long = "enable-xshape", env = "SOMMELIER_ENABLE_XSHAPE")]
    pub enable_xshape: bool,

    /// Forward X11 client move requests to the host via window bounds.
    #[arg(long = "enable-x11-move-windows", env = "SOMMELIER_ENABLE_X11_MOVE_WINDOWS")]
    pub enable_x11_move_windows: bool,

    /// Resize non-resizable windows by scaling them in a viewport.
    #[arg(long = "viewport-resize", env = "SOMMELIER_VIEWPORT_RESIZE")]
    pub viewport_resize: bool,

    /// Let Xwayland emulate screen position/size for legacy fullscreen
    /// applications.
    #[arg(
        long = "allow-xwayland-emulate-screen-pos-size",
        env = "SOMMELIER_ALLOW_XWAYLAND_EMULATE_SCREEN_POS_SIZE"
    )]
    pub allow_xwayland_emulate_screen_pos_size: bool,

    /// Ignore xdg_toplevel.configure events carrying no states.
    #[arg(
        long = "ignore-stateless-toplevel-configure",
        env = "SOMMELIER_IGNORE_STATELESS_TOPLEVEL_CONFIGURE"
    )]
    pub ignore_stateless_toplevel_configure: bool,

    /// Never let the host take a client-fullscreened window out of
    /// fullscreen.
    #[arg(
        long = "only-client-can-exit-fullscreen",
        env = "SOMMELIER_ONLY_CLIENT_CAN_EXIT_FULLSCREEN"
    )]
    pub only_client_can_exit_fullscreen: bool,

    /// Use outward rounding everywhere so repeated transforms are stable.
    #[arg(long = "stable-scaling", env = "SOMMELIER_STABLE_SCALING")]
    pub stable_scaling: bool,

    /// Treat windows that look like games as containerised.
    #[arg(long = "containerize-windows", env = "SOMMELIER_CONTAINERIZE_WINDOWS")]
    pub containerize_windows: bool,

    /// DRM render node to use instead of probing for a virtio-gpu device.
    #[arg(long = "force-drm-device", env = "SOMMELIER_DRM_DEVICE")]
    pub force_drm_device: Option<PathBuf>,

    /// Enable hardware acceleration in Xwayland.
    #[arg(long, env = "SOMMELIER_GLAMOR")]
    pub glamor: bool,

    /// Accept connections and fork a sommelier per client (launcher mode).
    #[arg(long)]
    pub parent: bool,

    /// Append frame timing information to this file on SIGUSR1.
    #[arg(long = "timing-filename", env = "SOMMELIER_TIMING_FILENAME")]
    pub timing_filename: Option<PathBuf>,

    /// Log event-loop statistics to this file.
    #[arg(long = "stats-log", env = "SOMMELIER_STATS_LOG")]
    pub stats_log: Option<PathBuf>,

    /// Dump a stats summary on exit.
    #[arg(long = "stats-summary", env = "SOMMELIER_STATS_SUMMARY")]
    pub stats_summary: bool,

    /// Interval in seconds of the periodic stats timer.
    #[arg(long = "stats-timer", env = "SOMMELIER_STATS_TIMER")]
    pub stats_timer: Option<u32>,
}

/// Validated configuration derived from [`Cli`].
pub struct Config {
    pub socket: String,
    pub display: Option<String>,
    pub scale: f64,
    pub direct_scale: bool,
    pub dpi: Vec<i32>,
    pub x11: bool,
    pub x_display: Option<u32>,
    pub xwayland_path: PathBuf,
    pub xwayland_gl_driver_path: Option<PathBuf>,
    pub x_auth: Option<PathBuf>,
    pub x_font_path: Option<String>,
    pub accelerators: Vec<Accelerator>,
    pub windowed_accelerators: Vec<Accelerator>,
    pub application_id: Option<String>,
    pub vm_identifier: String,
    pub application_id_x11_property: Option<String>,
    pub frame_color: u32,
    pub dark_frame_color: u32,
    pub fullscreen_mode: FullscreenMode,
    pub enable_linux_dmabuf: bool,
    pub enable_xshape: bool,
    pub enable_x11_move_windows: bool,
    pub viewport_resize: bool,
    pub allow_xwayland_emulate_screen_pos_size: bool,
    pub ignore_stateless_toplevel_configure: bool,
    pub only_client_can_exit_fullscreen: bool,
    pub stable_scaling: bool,
    pub containerize_windows: bool,
    pub force_drm_device: Option<PathBuf>,
    pub glamor: bool,
    pub timing_filename: Option<PathBuf>,
    pub stats_log: Option<PathBuf>,
    pub stats_summary: bool,
    pub stats_timer: Option<u32>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("socket", &self.socket)
            .field("scale", &self.scale)
            .field("direct_scale", &self.direct_scale)
            .field("x11", &self.x11)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Validate the raw options. Out-of-range scales are clamped rather than
    /// rejected; malformed accelerators and colors are startup errors.
    pub fn from_cli(cli: Cli) -> Result<Config, ConfigError> {
        let scale = cli.scale.clamp(MIN_SCALE, MAX_SCALE);
        if scale != cli.scale {
            log::warn!("scale {} out of range, clamped to {}", cli.scale, scale);
        }

        let accelerators = match &cli.accelerators {
            Some(spec) => parse_accelerators(spec)?,
            None => Vec::new(),
        };
        let windowed_accelerators = match &cli.windowed_accelerators {
            Some(spec) => parse_accelerators(spec)?,
            None => Vec::new(),
        };

        if cli.parent {
            log::warn!("--parent launcher mode requires the socket-launch harness; ignoring");
        }

        Ok(Config {
            socket: cli.socket,
            display: cli.display,
            scale,
            direct_scale: cli.direct_scale,
            dpi: cli.dpi,
            x11: cli.x11 || cli.x_display.is_some(),
            x_display: cli.x_display,
            xwayland_path: cli.xwayland_path,
            xwayland_gl_driver_path: cli.xwayland_gl_driver_path,
            x_auth: cli.x_auth,
            x_font_path: cli.x_font_path,
            accelerators,
            windowed_accelerators,
            application_id: cli.application_id,
            vm_identifier: cli.vm_identifier,
            application_id_x11_property: cli.application_id_x11_property,
            frame_color: parse_color(&cli.frame_color)?,
            dark_frame_color: parse_color(&cli.dark_frame_color)?,
            fullscreen_mode: cli.fullscreen_mode,
            enable_linux_dmabuf: cli.enable_linux_dmabuf,
            enable_xshape: cli.enable_xshape,
            enable_x11_move_windows: cli.enable_x11_move_windows,
            viewport_resize: cli.viewport_resize,
            allow_xwayland_emulate_screen_pos_size: cli.allow_xwayland_emulate_screen_pos_size,
            ignore_stateless_toplevel_configure: cli.ignore_stateless_toplevel_configure,
            only_client_can_exit_fullscreen: cli.only_client_can_exit_fullscreen,
            stable_scaling: cli.stable_scaling,
            containerize_windows: cli.containerize_windows,
            force_drm_device: cli.force_drm_device,
            glamor: cli.glamor,
            timing_filename: cli.timing_filename,
            stats_log: cli.stats_log,
            stats_summary: cli.stats_summary,
            stats_timer: cli.stats_timer,
        })
    }
}

/// Map a keysym to the lower-cased form used for accelerator comparison.
///
/// xkb resolves names case-insensitively to the canonical (lower-case where
/// one exists) keysym, so a name round-trip is equivalent to
/// `xkb_keysym_to_lower`.
pub fn canonical_keysym(sym: xkb::Keysym) -> xkb::Keysym {
    let name = xkb::keysym_get_name(sym);
    let lowered = xkb::keysym_from_name(&name, xkb::KEYSYM_CASE_INSENSITIVE);
    if lowered.raw() == 0 {
        sym
    } else {
        lowered
    }
}

/// Parse a comma-separated accelerator list such as
/// `<Control><Alt>Delete,<Alt>F4`.
pub fn parse_accelerators(spec: &str) -> Result<Vec<Accelerator>, ConfigError> {
    spec.split(',')
        .filter(|chord| !chord.is_empty())
        .map(parse_accelerator)
        .collect()
}

fn parse_accelerator(chord: &str) -> Result<Accelerator, ConfigError> {
    let mut modifiers = Modifiers::empty();
    let mut rest = chord;

    while let Some(stripped) = rest.strip_prefix('<') {
        let end = stripped
            .find('>')
            .ok_or_else(|| ConfigError::InvalidAccelerator(chord.to_owned()))?;
        let name = &stripped[..end];
        modifiers |= match name {
            "Control" => Modifiers::CONTROL,
            "Alt" => Modifiers::ALT,
            "Shift" => Modifiers::SHIFT,
            _ => return Err(ConfigError::InvalidAccelerator(chord.to_owned())),
        };
        rest = &stripped[end + 1..];
    }

    if rest.is_empty() {
        return Err(ConfigError::InvalidAccelerator(chord.to_owned()));
    }

    let symbol = xkb::keysym_from_name(rest, xkb::KEYSYM_CASE_INSENSITIVE);
    if symbol.raw() == 0 {
        return Err(ConfigError::UnknownKeysym(rest.to_owned()));
    }

    Ok(Accelerator { modifiers, symbol })
}

/// Parse a `#rrggbb` color into the ARGB word used by aura frame colors.
pub fn parse_color(color: &str) -> Result<u32, ConfigError> {
    let hex = color
        .strip_prefix('#')
        .ok_or_else(|| ConfigError::InvalidColor(color.to_owned()))?;
    if hex.len() != 6 {
        return Err(ConfigError::InvalidColor(color.to_owned()));
    }
    let rgb =
        u32::from_str_radix(hex, 16).map_err(|_| ConfigError::InvalidColor(color.to_owned()))?;
    Ok(0xff00_0000 | rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parses_to_opaque_argb() {
        assert_eq!(parse_color("#f2f2f2").unwrap(), 0xfff2f2f2);
        assert_eq!(parse_color("#000000").unwrap(), 0xff000000);
        assert!(parse_color("f2f2f2").is_err());
        assert!(parse_color("#f2f2f").is_err());
        assert!(parse_color("#g2f2f2").is_err());
    }

    #[test]
    fn chord_with_two_modifiers() {
        let accels = parse_accelerators("<Control><Alt>Delete").unwrap();
        assert_eq!(accels.len(), 1);
        assert_eq!(accels[0].modifiers, Modifiers::CONTROL | Modifiers::ALT);
        assert_eq!(
            accels[0].symbol,
            xkb::keysym_from_name("Delete", xkb::KEYSYM_CASE_INSENSITIVE)
        );
    }

    #[test]
    fn chord_list() {
        let accels = parse_accelerators("<Control><Alt>Delete,<Alt>F4").unwrap();
        assert_eq!(accels.len(), 2);
        assert_eq!(accels[1].modifiers, Modifiers::ALT);
    }

    #[test]
    fn unterminated_modifier_is_rejected() {
        assert!(parse_accelerators("<Control").is_err());
        assert!(parse_accelerators("<Hyper>x").is_err());
        assert!(parse_accelerators("<Alt>").is_err());
    }
}
