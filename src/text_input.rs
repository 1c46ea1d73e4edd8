//! zwp_text_input_manager_v1 adaptor.
//!
//! Input-method traffic passes through with seat and surface arguments
//! remapped and the cursor rectangle scaled; composition state itself is
//! opaque to the proxy.

use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_protocols::wp::text_input::zv1::client::zwp_text_input_v1::{
    self as c_text_input, ZwpTextInputV1 as CTextInput,
};
use wayland_protocols::wp::text_input::zv1::server::zwp_text_input_manager_v1::{
    self as s_manager, ZwpTextInputManagerV1 as STextInputManager,
};
use wayland_protocols::wp::text_input::zv1::server::zwp_text_input_v1::{
    self as s_text_input, ZwpTextInputV1 as STextInput,
};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};
use crate::transform;

impl GlobalDispatch<STextInputManager, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<STextInputManager>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<STextInputManager, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &STextInputManager,
        request: s_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_manager::Request::CreateTextInput { id } => {
                let Some(manager) = &state.text_input_manager else {
                    return;
                };
                let paired: Paired<STextInput> = Paired::default();
                let host = manager.create_text_input(&state.qh, paired.clone());
                let resource = data_init.init(id, host);
                let _ = paired.set(resource);
            }
            _ => {}
        }
    }
}

impl Dispatch<STextInput, CTextInput> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &STextInput,
        request: s_text_input::Request,
        host: &CTextInput,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_text_input::Request::Activate { seat, surface } => {
                let (Some(host_seat), Some(host_surface)) = (
                    crate::seat::host_seat(state, &seat),
                    surface.data::<CWlSurface>(),
                ) else {
                    return;
                };
                host.activate(host_seat, host_surface);
            }
            s_text_input::Request::Deactivate { seat } => {
                if let Some(host_seat) = crate::seat::host_seat(state, &seat) {
                    host.deactivate(host_seat);
                }
            }
            s_text_input::Request::ShowInputPanel => host.show_input_panel(),
            s_text_input::Request::HideInputPanel => host.hide_input_panel(),
            s_text_input::Request::Reset => host.reset(),
            s_text_input::Request::SetSurroundingText { text, cursor, anchor } => {
                host.set_surrounding_text(text, cursor, anchor);
            }
            s_text_input::Request::SetContentType { hint, purpose } => {
                let hint = c_text_input::ContentHint::from_bits_truncate(match hint {
                    wayland_server::WEnum::Value(h) => h.bits(),
                    wayland_server::WEnum::Unknown(v) => v,
                });
                let purpose = match purpose {
                    wayland_server::WEnum::Value(p) => {
                        c_text_input::ContentPurpose::try_from(p as u32)
                            .unwrap_or(c_text_input::ContentPurpose::Normal)
                    }
                    wayland_server::WEnum::Unknown(_) => c_text_input::ContentPurpose::Normal,
                };
                host.set_content_type(hint, purpose);
            }
            s_text_input::Request::SetCursorRectangle { x, y, width, height } => {
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                host.set_cursor_rectangle(x, y, w, h);
            }
            s_text_input::Request::SetPreferredLanguage { language } => {
                host.set_preferred_language(language);
            }
            s_text_input::Request::CommitState { serial } => host.commit_state(serial),
            s_text_input::Request::InvokeAction { button, index } => {
                host.invoke_action(button, index);
            }
            _ => {}
        }
    }

}

impl ClientDispatch<CTextInput, Paired<STextInput>> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CTextInput,
        event: c_text_input::Event,
        data: &Paired<STextInput>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_text_input::Event::Enter { surface } => {
                if let Some((_, s)) =
                    state.surfaces.iter().find(|(_, s)| s.host.id() == surface.id())
                {
                    resource.enter(&s.resource);
                }
            }
            c_text_input::Event::Leave => resource.leave(),
            c_text_input::Event::ModifiersMap { map } => resource.modifiers_map(map),
            c_text_input::Event::InputPanelState { state: panel_state } => {
                resource.input_panel_state(panel_state);
            }
            c_text_input::Event::PreeditString { serial, text, commit } => {
                resource.preedit_string(serial, text, commit);
            }
            c_text_input::Event::PreeditStyling { index, length, style } => {
                let style = match style {
                    wayland_client::WEnum::Value(s) => s as u32,
                    wayland_client::WEnum::Unknown(v) => v,
                };
                let style = s_text_input::PreeditStyle::try_from(style)
                    .unwrap_or(s_text_input::PreeditStyle::Default);
                resource.preedit_styling(index, length, style);
            }
            c_text_input::Event::PreeditCursor { index } => resource.preedit_cursor(index),
            c_text_input::Event::CommitString { serial, text } => {
                resource.commit_string(serial, text);
            }
            c_text_input::Event::CursorPosition { index, anchor } => {
                resource.cursor_position(index, anchor);
            }
            c_text_input::Event::DeleteSurroundingText { index, length } => {
                resource.delete_surrounding_text(index, length);
            }
            c_text_input::Event::Keysym { serial, time, sym, state: key_state, modifiers } => {
                resource.keysym(serial, time, sym, key_state, modifiers);
            }
            c_text_input::Event::Language { serial, language } => {
                resource.language(serial, language);
            }
            c_text_input::Event::TextDirection { serial, direction } => {
                let direction = match direction {
                    wayland_client::WEnum::Value(d) => d as u32,
                    wayland_client::WEnum::Unknown(v) => v,
                };
                let direction = s_text_input::TextDirection::try_from(direction)
                    .unwrap_or(s_text_input::TextDirection::Auto);
                resource.text_direction(serial, direction);
            }
            _ => {}
        }
    }
}
