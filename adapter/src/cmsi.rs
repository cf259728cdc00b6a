//! Message channel (`cmsi`) component APIs.

use crate::config::Endpoints;
use crate::esb_api;
use dataapi::{ApiClient, DataApi};
use http::Method;

const MODULE: &str = "CMSI";

pub struct CmsiApi {
    pub send_msg: DataApi,
    pub get_msg_type: DataApi,
    pub send_weixin: DataApi,
    pub send_mail: DataApi,
}

impl CmsiApi {
    pub const ACTIONS: &'static [&'static str] = &["send_msg", "get_msg_type", "send_weixin", "send_mail"];

    pub fn new(client: &ApiClient, endpoints: &Endpoints) -> Self {
        let api = |method: Method, name: &str, description: &str| {
            esb_api(client, endpoints.esb(&format!("cmsi/{name}/")), method, MODULE, description)
        };
        CmsiApi {
            send_msg: api(Method::POST, "send_msg", "send a message through a generic channel"),
            get_msg_type: api(Method::GET, "get_msg_type", "query the supported message types"),
            send_weixin: api(Method::POST, "send_weixin", "send a wechat message"),
            send_mail: api(Method::POST, "send_mail", "send a mail"),
        }
    }

    pub fn find(&self, action: &str) -> Option<&DataApi> {
        match action {
            "send_msg" => Some(&self.send_msg),
            "get_msg_type" => Some(&self.get_msg_type),
            "send_weixin" => Some(&self.send_weixin),
            "send_mail" => Some(&self.send_mail),
            _ => None,
        }
    }
}
