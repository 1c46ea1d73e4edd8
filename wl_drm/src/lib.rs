//! Bindings to the legacy `wl_drm` buffer-sharing protocol.
//!
//! The protocol predates `zwp_linux_dmabuf_v1` but is still probed by EGL
//! and by older clients, so a compositor-proxy has to be able to speak it
//! on both sides of the boundary.

#![forbid(improper_ctypes, unsafe_op_in_unsafe_fn)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[cfg(feature = "client")]
pub mod client {
    //! Client-side API of the wl_drm protocol
    #![allow(missing_docs)]
    use wayland_client;
    use wayland_client::protocol::*;

    pub mod __interfaces {
        use wayland_client::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("./protocols/wayland-drm.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_client_code!("./protocols/wayland-drm.xml");
}

#[cfg(feature = "server")]
pub mod server {
    //! Server-side API of the wl_drm protocol
    #![allow(missing_docs)]
    use wayland_server;
    use wayland_server::protocol::*;

    pub mod __interfaces {
        use wayland_server::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("./protocols/wayland-drm.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_server_code!("./protocols/wayland-drm.xml");
}
