//! Strongly-typed X11 atom table, interned in a single round trip at
//! window-manager startup.

x11rb::atom_manager! {
    /// All well-known atoms the window manager and clipboard bridge use.
    pub Atoms:
    /// Cookie type of the batched intern.
    AtomsCookie {
        WM_S0,
        WM_PROTOCOLS,
        WM_STATE,
        WM_CHANGE_STATE,
        WM_DELETE_WINDOW,
        WM_TAKE_FOCUS,
        WM_CLIENT_LEADER,
        WL_SURFACE_ID,
        _NET_WM_SURFACE_ID,
        UTF8_STRING,
        MOTIF_WM_HINTS,
        TEXT,
        INCR,
        TARGETS,
        TIMESTAMP,
        CLIPBOARD,
        CLIPBOARD_MANAGER,
        WL_SELECTION,
        _NET_ACTIVE_WINDOW,
        _NET_FRAME_EXTENTS,
        _NET_STARTUP_ID,
        _NET_SUPPORTED,
        _NET_SUPPORTING_WM_CHECK,
        _NET_WM_NAME,
        _NET_WM_MOVERESIZE,
        _NET_WM_STATE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_STATE_MAXIMIZED_VERT,
        _NET_WM_STATE_MAXIMIZED_HORZ,
        _NET_WM_STATE_FOCUSED,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NORMAL,
        _NET_WM_PID,
        _GTK_THEME_VARIANT,
        _XWAYLAND_RANDR_EMU_MONITOR_RECTS,
        STEAM_GAME,
    }
}

impl Atoms {
    /// The atoms listed in `_NET_SUPPORTED` on the root window.
    pub fn net_supported(&self) -> [x11rb::protocol::xproto::Atom; 8] {
        [
            self._NET_ACTIVE_WINDOW,
            self._NET_WM_MOVERESIZE,
            self._NET_WM_NAME,
            self._NET_WM_STATE,
            self._NET_WM_STATE_FULLSCREEN,
            self._NET_WM_STATE_MAXIMIZED_VERT,
            self._NET_WM_STATE_MAXIMIZED_HORZ,
            self._NET_WM_STATE_FOCUSED,
        ]
    }
}
