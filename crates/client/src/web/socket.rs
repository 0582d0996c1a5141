// Browser WebSocket transport
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use crate::error::ConnectError;
use crate::network::{Connection, LinkState, Transport, ws_url};

#[derive(Default)]
struct Shared {
    inbox: Vec<String>,
    /// Sent before `onopen`; flushed when the socket opens.
    outbox: VecDeque<String>,
    closed: bool,
}

/// One chunk-server socket. Handlers are detached and the socket closed on drop.
pub struct WebSocketConnection {
    ws: WebSocket,
    shared: Rc<RefCell<Shared>>,
    _onopen: Closure<dyn FnMut()>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onerror: Closure<dyn FnMut(JsValue)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
}

impl WebSocketConnection {
    pub fn open(url: &str) -> Result<Self, JsValue> {
        let ws = WebSocket::new(url)?;
        let shared = Rc::new(RefCell::new(Shared::default()));

        let open_shared = shared.clone();
        let open_ws = ws.clone();
        let onopen = Closure::<dyn FnMut()>::new(move || {
            tracing::debug!("WebSocket open");
            let pending: Vec<String> = open_shared.borrow_mut().outbox.drain(..).collect();
            for text in pending {
                if let Err(e) = open_ws.send_with_str(&text) {
                    tracing::warn!("Send failed: {:?}", e);
                }
            }
        });
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));

        // Push to the inbox only; the game loop drains it on its next tick.
        let msg_shared = shared.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(text) = event.data().as_string() {
                msg_shared.borrow_mut().inbox.push(text);
            }
        });
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        let onerror = Closure::<dyn FnMut(JsValue)>::new(move |e: JsValue| {
            tracing::error!("WebSocket error: {:?}", e);
        });
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        let close_shared = shared.clone();
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            tracing::info!("WebSocket closed: {}", event.code());
            close_shared.borrow_mut().closed = true;
        });
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));

        Ok(Self {
            ws,
            shared,
            _onopen: onopen,
            _onmessage: onmessage,
            _onerror: onerror,
            _onclose: onclose,
        })
    }
}

impl Connection for WebSocketConnection {
    fn send(&mut self, text: String) {
        match self.ws.ready_state() {
            WebSocket::CONNECTING => self.shared.borrow_mut().outbox.push_back(text),
            WebSocket::OPEN => {
                if let Err(e) = self.ws.send_with_str(&text) {
                    tracing::warn!("Send failed: {:?}", e);
                }
            }
            // Closing or closed: fire-and-forget means dropped.
            _ => {}
        }
    }

    fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.shared.borrow_mut().inbox)
    }

    fn close(&mut self) {
        // Let anything buffered for a still-connecting socket go out first.
        if self.ws.ready_state() == WebSocket::OPEN {
            let pending: Vec<String> = self.shared.borrow_mut().outbox.drain(..).collect();
            for text in pending {
                let _ = self.ws.send_with_str(&text);
            }
        }
        let _ = self.ws.close();
        self.shared.borrow_mut().closed = true;
    }

    fn state(&self) -> LinkState {
        if self.shared.borrow().closed {
            return LinkState::Closed;
        }
        match self.ws.ready_state() {
            WebSocket::CONNECTING => LinkState::Connecting,
            WebSocket::OPEN => LinkState::Open,
            _ => LinkState::Closed,
        }
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        let _ = self.ws.close();
    }
}

pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn connect(&mut self, address: &str) -> Result<Box<dyn Connection>, ConnectError> {
        let url = ws_url(address);
        tracing::info!("Connecting to: {}", url);
        WebSocketConnection::open(&url)
            .map(|c| Box::new(c) as Box<dyn Connection>)
            .map_err(|e| ConnectError::new(address, format!("{:?}", e)))
    }
}
