use serde::Deserialize;

pub const WS_APP_PROTOCOL: &str = "authorai.v1";

#[derive(Debug, Deserialize, Default)]
pub struct WsIncomingMessage {
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub message: Option<String>,
}
