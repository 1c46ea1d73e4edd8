//! This crate provides bindings to the Chromium Exo wayland protocol
//! extensions that sommelier relies on when talking to a ChromeOS host
//! compositor.
//!
//! These bindings are generated from trimmed copies of the protocol XML,
//! keeping the interfaces and messages sommelier actually exchanges with
//! the host. The protocols are provided in pairs of modules named `client`
//! and `server`, which are activated by the cargo features of the same
//! names.

#![warn(missing_docs)]
#![forbid(improper_ctypes, unsafe_op_in_unsafe_fn)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[macro_use]
mod protocol_macro;

pub mod aura_shell {
    //! Aura shell
    //!
    //! Chromium-specific extensions for surface decoration, application
    //! identification, per-output scale enumeration and screen-coordinate
    //! toplevel placement.

    #[allow(missing_docs)]
    pub mod v38 {
        wayland_protocol!("./protocols/aura-shell.xml", []);
    }
}

pub mod stylus {
    //! Stylus extension for wl_touch
    //!
    //! Reports the tool type (touch, pen, eraser) plus force and tilt for
    //! touch sequences, allowing a client to re-route pen input onto the
    //! tablet protocol.

    #[allow(missing_docs)]
    pub mod v2 {
        wayland_protocol!("./protocols/stylus-v2.xml", []);
    }
}

pub mod keyboard_extension {
    //! Keyboard extension
    //!
    //! Lets a client acknowledge each wl_keyboard key event as handled or
    //! not handled, so the compositor can apply fallback behaviour for
    //! unhandled keys.

    #[allow(missing_docs)]
    pub mod v1 {
        wayland_protocol!("./protocols/keyboard-extension-v1.xml", []);
    }
}
