use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Header consulted before the peer address when a proxy sits in front.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Best-known IP of the caller: the first `X-Forwarded-For` hop, else the
/// connection's peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(forwarded.or(peer)))
    }
}

/// Address to record when a registration omits one.
pub fn default_address(ip: IpAddr, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("http://{}", SocketAddr::new(ip, port)),
        None => match ip {
            IpAddr::V4(v4) => format!("http://{}", v4),
            IpAddr::V6(v6) => format!("http://[{}]", v6),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> ClientAddr {
        let (mut parts, _) = req.into_parts();
        ClientAddr::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[test]
    fn test_default_address() {
        let v4: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(default_address(v4, None), "http://10.1.2.3");
        assert_eq!(default_address(v4, Some(5000)), "http://10.1.2.3:5000");

        let v6: IpAddr = "::1".parse().unwrap();
        assert_eq!(default_address(v6, None), "http://[::1]");
        assert_eq!(default_address(v6, Some(80)), "http://[::1]:80");
    }

    #[tokio::test]
    async fn test_forwarded_header_wins() {
        let mut req = Request::builder()
            .header(FORWARDED_FOR_HEADER, "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9999))));

        let ClientAddr(ip) = extract(req).await;
        assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_peer_address_fallback() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 4], 40000))));

        let ClientAddr(ip) = extract(req).await;
        assert_eq!(ip, Some("192.168.1.4".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let req = Request::builder().body(()).unwrap();
        assert_eq!(extract(req).await, ClientAddr(None));
    }
}
