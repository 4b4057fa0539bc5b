//! Blocking CDP session for a single page target.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::error::CdpError;
use super::locator::{CanvasProbe, FrameNode};
use super::page::GamePage;
use super::protocol::{BoundingBox, BoxModel, CdpRequest, CdpResponse, FrameTreeNode};

/// How long an ordinary CDP call may take before it is abandoned.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

const ISOLATED_WORLD_NAME: &str = "slot-autoplay";

/// Mirrors the visibility rule browsers use for hit testing: rendered, not
/// `visibility: hidden`, and a non-empty layout box.
const IS_VISIBLE_FN: &str = r#"function() {
    if (!this.isConnected) return false;
    const style = window.getComputedStyle(this);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = this.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

/// A remote handle to a canvas element.
#[derive(Debug, Clone)]
pub struct CdpElement {
    pub object_id: String,
}

/// Page session over the target's own WebSocket.
///
/// Calls are strictly sequential: a request is sent and messages are read
/// until the reply with the same id arrives. Events in between are dropped.
pub struct PageSession {
    socket: RefCell<WebSocket<MaybeTlsStream<TcpStream>>>,
    next_id: Cell<u64>,
    /// Isolated-world execution context per frame id
    contexts: RefCell<HashMap<String, i64>>,
}

impl PageSession {
    /// Connects to a page's `webSocketDebuggerUrl`.
    pub fn connect(ws_url: &str) -> Result<Self, CdpError> {
        let (socket, _) = tungstenite::connect(ws_url)?;

        let session = Self {
            socket: RefCell::new(socket),
            next_id: Cell::new(1),
            contexts: RefCell::new(HashMap::new()),
        };
        session.call("Page.enable", None)?;
        session.call("DOM.enable", None)?;

        crate::log(&format!("CDP session connected to {}", ws_url));
        Ok(session)
    }

    /// Sends a CDP command and waits up to `CALL_TIMEOUT` for its reply.
    pub fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.call_with_timeout(method, params, Some(CALL_TIMEOUT))
    }

    /// Sends a CDP command and waits for its reply. `None` waits indefinitely.
    pub fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, CdpError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let request = serde_json::to_string(&CdpRequest { id, method, params })?;
        let mut socket = self.socket.borrow_mut();
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream.set_read_timeout(timeout.filter(|t| !t.is_zero()))?;
        }
        socket.send(Message::Text(request.into()))?;

        loop {
            let text = match socket.read()? {
                Message::Text(text) => text,
                Message::Close(_) => return Err(CdpError::SessionClosed),
                _ => continue,
            };

            let response: CdpResponse = match serde_json::from_str(text.as_str()) {
                Ok(r) => r,
                Err(e) => {
                    crate::log(&format!("Failed to parse CDP message: {}", e));
                    continue;
                }
            };

            if response.id != Some(id) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(CdpError::Protocol {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    /// Evaluates an expression in the main frame and returns its JSON value.
    pub fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self.call(
            "Runtime.evaluate",
            Some(json!({ "expression": expression, "returnByValue": true })),
        )?;
        check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Returns the frame's isolated-world context, creating it on first use.
    fn frame_context(&self, frame_id: &str) -> Result<i64, CdpError> {
        if let Some(id) = self.contexts.borrow().get(frame_id).copied() {
            return Ok(id);
        }

        let result = self.call(
            "Page.createIsolatedWorld",
            Some(json!({ "frameId": frame_id, "worldName": ISOLATED_WORLD_NAME })),
        )?;
        let id = result["executionContextId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("missing executionContextId".to_string()))?;
        self.contexts.borrow_mut().insert(frame_id.to_string(), id);
        Ok(id)
    }

    /// Forgets contexts of frames that are no longer in the tree.
    fn prune_contexts(&self, tree: &FrameTreeNode) {
        let mut live = HashSet::new();
        let mut pending = vec![tree];
        while let Some(node) = pending.pop() {
            live.insert(node.frame.id.as_str());
            pending.extend(node.child_frames.iter());
        }
        self.contexts
            .borrow_mut()
            .retain(|id, _| live.contains(id.as_str()));
    }
}

fn check_exception(result: &Value) -> Result<(), CdpError> {
    match result.get("exceptionDetails") {
        Some(details) => Err(CdpError::JavaScript(
            details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown exception")
                .to_string(),
        )),
        None => Ok(()),
    }
}

impl FrameNode for FrameTreeNode {
    fn url(&self) -> &str {
        &self.frame.url
    }

    fn child_frames(&self) -> &[Self] {
        &self.child_frames
    }
}

impl CanvasProbe<FrameTreeNode> for PageSession {
    type Element = CdpElement;
    type Error = CdpError;

    fn first_canvas(&self, frame: &FrameTreeNode) -> Result<Option<CdpElement>, CdpError> {
        let frame_id = &frame.frame.id;
        let context_id = self.frame_context(frame_id)?;
        let result = match self.call(
            "Runtime.evaluate",
            Some(json!({
                "expression": "document.querySelector('canvas')",
                "contextId": context_id,
            })),
        ) {
            Ok(result) => result,
            // The frame navigated and took its isolated world with it.
            Err(e @ CdpError::Protocol { .. }) => {
                self.contexts.borrow_mut().remove(frame_id);
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        check_exception(&result)?;

        Ok(result["result"]["objectId"]
            .as_str()
            .map(|object_id| CdpElement {
                object_id: object_id.to_string(),
            }))
    }

    fn is_visible(&self, element: &CdpElement) -> Result<bool, CdpError> {
        let result = self.call(
            "Runtime.callFunctionOn",
            Some(json!({
                "objectId": element.object_id,
                "functionDeclaration": IS_VISIBLE_FN,
                "returnByValue": true,
            })),
        )?;
        check_exception(&result)?;
        Ok(result["result"]["value"].as_bool().unwrap_or(false))
    }

    fn release(&self, element: &CdpElement) {
        if let Err(e) = self.call(
            "Runtime.releaseObject",
            Some(json!({ "objectId": element.object_id })),
        ) {
            crate::log(&format!("Failed to release {}: {}", element.object_id, e));
        }
    }
}

impl GamePage<FrameTreeNode> for PageSession {
    fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<(), CdpError> {
        let result =
            self.call_with_timeout("Page.navigate", Some(json!({ "url": url })), timeout)?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(error.to_string()));
        }
        Ok(())
    }

    fn ready_state(&self) -> Result<String, CdpError> {
        Ok(self
            .evaluate("document.readyState")?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    /// Returns the page's frame tree as a single-root list.
    fn frame_tree(&self) -> Result<Vec<FrameTreeNode>, CdpError> {
        let result = self.call("Page.getFrameTree", None)?;
        let tree: FrameTreeNode = serde_json::from_value(result["frameTree"].clone())?;
        self.prune_contexts(&tree);
        Ok(vec![tree])
    }

    fn bounding_box(&self, element: &CdpElement) -> Result<Option<BoundingBox>, CdpError> {
        let result = match self.call(
            "DOM.getBoxModel",
            Some(json!({ "objectId": element.object_id })),
        ) {
            Ok(result) => result,
            // "Could not compute box model." for detached or display:none elements
            Err(CdpError::Protocol { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let model: BoxModel = serde_json::from_value(result["model"].clone())?;
        Ok(BoundingBox::from_quad(&model.border))
    }

    fn click(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({ "type": "mouseMoved", "x": x, "y": y })),
        )?;
        for event in ["mousePressed", "mouseReleased"] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": event,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": 1,
                })),
            )?;
        }
        Ok(())
    }

    fn screenshot_clip(&self, bbox: &BoundingBox, path: &Path) -> Result<(), CdpError> {
        // Clip is in document coordinates; the box is relative to the viewport.
        let metrics = self.call("Page.getLayoutMetrics", None)?;
        let scroll_x = metrics["cssVisualViewport"]["pageX"].as_f64().unwrap_or(0.0);
        let scroll_y = metrics["cssVisualViewport"]["pageY"].as_f64().unwrap_or(0.0);

        let result = self.call(
            "Page.captureScreenshot",
            Some(json!({
                "format": "png",
                "clip": {
                    "x": bbox.x + scroll_x,
                    "y": bbox.y + scroll_y,
                    "width": bbox.width,
                    "height": bbox.height,
                    "scale": 1,
                },
            })),
        )?;

        let data = result["data"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("screenshot has no data".to_string()))?;
        let bytes = BASE64
            .decode(data)
            .map_err(|e| CdpError::InvalidResponse(format!("screenshot data: {}", e)))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// A scripted single-page DevTools endpoint for tests.
#[cfg(test)]
pub(crate) mod test_server {
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::{Value, json};
    use tungstenite::Message;

    /// How the fake page answers one command.
    pub enum Reply {
        Result(Value),
        Error(&'static str),
        Delayed(Duration, Value),
        Close,
    }

    /// Serves one connection, answering each command with `handler(method)`.
    /// Returns the ws:// URL and the log of received methods.
    pub fn spawn<H>(handler: H) -> (String, Arc<Mutex<Vec<String>>>)
    where
        H: Fn(&str) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let methods = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&methods);

        std::thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let Ok(mut ws) = tungstenite::accept(stream) else {
                return;
            };
            while let Ok(msg) = ws.read() {
                let Message::Text(text) = msg else {
                    continue;
                };
                let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
                    continue;
                };
                let method = request["method"].as_str().unwrap_or_default().to_string();
                seen.lock().unwrap().push(method.clone());

                let reply = match handler(&method) {
                    Reply::Result(result) => json!({ "id": request["id"], "result": result }),
                    Reply::Error(message) => json!({
                        "id": request["id"],
                        "error": { "code": -32000, "message": message },
                    }),
                    Reply::Delayed(delay, result) => {
                        std::thread::sleep(delay);
                        json!({ "id": request["id"], "result": result })
                    }
                    Reply::Close => {
                        let _ = ws.close(None);
                        let _ = ws.flush();
                        continue;
                    }
                };
                if ws.send(Message::Text(reply.to_string().into())).is_err() {
                    break;
                }
            }
        });

        (url, methods)
    }

    /// Answers everything with an empty result.
    pub fn ok(_method: &str) -> Reply {
        Reply::Result(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::test_server::{Reply, spawn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn test_check_exception_reads_description() {
        let result = json!({
            "result": { "type": "object", "subtype": "error" },
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": { "description": "TypeError: x is undefined" }
            }
        });
        match check_exception(&result) {
            Err(CdpError::JavaScript(msg)) => assert_eq!(msg, "TypeError: x is undefined"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_check_exception_passes_clean_result() {
        let result = json!({ "result": { "type": "string", "value": "complete" } });
        assert!(check_exception(&result).is_ok());
    }

    #[test]
    fn test_frame_tree_node_is_a_frame_node() {
        let tree: FrameTreeNode = serde_json::from_value(json!({
            "frame": { "id": "main", "url": "https://launcher/" },
            "childFrames": [ { "frame": { "id": "game", "url": "https://game/" } } ]
        }))
        .unwrap();

        assert_eq!(FrameNode::url(&tree), "https://launcher/");
        assert_eq!(tree.child_frames().len(), 1);
        assert_eq!(tree.child_frames()[0].url(), "https://game/");
    }

    fn count(methods: &std::sync::Mutex<Vec<String>>, method: &str) -> usize {
        methods.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    fn main_frame() -> FrameTreeNode {
        serde_json::from_value(json!({ "frame": { "id": "main", "url": "https://game/" } }))
            .unwrap()
    }

    #[test]
    fn test_closed_page_is_a_fatal_error() {
        let (url, _) = spawn(|method| match method {
            "Runtime.evaluate" => Reply::Close,
            other => test_server::ok(other),
        });
        let session = PageSession::connect(&url).unwrap();

        let err = session.ready_state().unwrap_err();

        assert!(err.is_fatal(), "unexpected error: {}", err);
    }

    #[test]
    fn test_navigate_without_timeout_outlasts_slow_reply() {
        let (url, _) = spawn(|method| match method {
            "Page.navigate" => {
                Reply::Delayed(Duration::from_millis(300), json!({ "frameId": "main" }))
            }
            other => test_server::ok(other),
        });
        let session = PageSession::connect(&url).unwrap();

        let start = Instant::now();
        session.navigate("https://game/", None).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_navigate_honours_explicit_timeout() {
        let (url, _) = spawn(|method| match method {
            "Page.navigate" => {
                Reply::Delayed(Duration::from_millis(500), json!({ "frameId": "main" }))
            }
            other => test_server::ok(other),
        });
        let session = PageSession::connect(&url).unwrap();

        let result = session.navigate("https://game/", Some(Duration::from_millis(50)));

        assert!(matches!(result, Err(CdpError::Timeout(_))), "{:?}", result);
    }

    #[test]
    fn test_isolated_world_is_reused_per_frame() {
        let (url, methods) = spawn(|method| match method {
            "Page.createIsolatedWorld" => Reply::Result(json!({ "executionContextId": 7 })),
            "Runtime.evaluate" => Reply::Result(json!({
                "result": { "type": "object", "subtype": "node", "objectId": "canvas-1" }
            })),
            other => test_server::ok(other),
        });
        let session = PageSession::connect(&url).unwrap();
        let frame = main_frame();

        for _ in 0..3 {
            let canvas = session.first_canvas(&frame).unwrap().unwrap();
            assert_eq!(canvas.object_id, "canvas-1");
        }

        assert_eq!(count(&methods, "Page.createIsolatedWorld"), 1);
    }

    #[test]
    fn test_lost_context_is_recreated() {
        let evaluations = AtomicUsize::new(0);
        let (url, methods) = spawn(move |method| match method {
            "Page.createIsolatedWorld" => Reply::Result(json!({ "executionContextId": 7 })),
            "Runtime.evaluate" if evaluations.fetch_add(1, Ordering::SeqCst) == 0 => {
                Reply::Error("Cannot find context with specified id")
            }
            "Runtime.evaluate" => Reply::Result(json!({
                "result": { "type": "object", "subtype": "null" }
            })),
            other => test_server::ok(other),
        });
        let session = PageSession::connect(&url).unwrap();
        let frame = main_frame();

        assert!(session.first_canvas(&frame).is_err());
        assert!(session.first_canvas(&frame).unwrap().is_none());

        assert_eq!(count(&methods, "Page.createIsolatedWorld"), 2);
    }

    #[test]
    fn test_release_sends_release_object() {
        let (url, methods) = spawn(test_server::ok);
        let session = PageSession::connect(&url).unwrap();

        session.release(&CdpElement {
            object_id: "canvas-1".to_string(),
        });

        assert_eq!(count(&methods, "Runtime.releaseObject"), 1);
    }
}
