use crate::service::LikeService;

// app's shared state
pub struct AppState {
    pub service: LikeService,
    pub trust_proxy_headers: bool, // read client ip from proxy headers
}
