/// OAuth redirect listener and the interactive sign-in flow
use super::spotify::SpotifyProvider;
use super::ProviderError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// How long to wait for the browser to come back before giving up
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<!DOCTYPE html>\r\n\
<html>\r\n\
<head><title>Authentication Complete</title></head>\r\n\
<body style=\"font-family: Arial, sans-serif; text-align: center; padding: 50px;\">\r\n\
<h1>Authentication Successful</h1>\r\n\
<p>You can close this window and return to the terminal.</p>\r\n\
</body>\r\n\
</html>\r\n";

const FAILURE_PAGE: &str = "<!DOCTYPE html>\r\n\
<html>\r\n\
<body>\r\n\
<p>Authentication failed. Please try again.</p>\r\n\
</body>\r\n\
</html>\r\n";

/// What a request to the redirect URI carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Code(String),
    Denied(String),
    /// Not the callback (favicon and the like)
    Ignored,
}

/// Parse the request line of a redirect request, e.g. `GET /callback?code=..&state=.. HTTP/1.1`
pub fn parse_callback(request_line: &str, expected_state: &str) -> Callback {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Callback::Ignored;
    };
    let Ok(url) = url::Url::parse("http://localhost")
        .and_then(|base| base.join(target))
    else {
        return Callback::Ignored;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Callback::Denied(error);
    }
    match code {
        Some(_) if state.as_deref() != Some(expected_state) => {
            Callback::Denied("state mismatch".to_string())
        }
        Some(code) if !code.is_empty() => Callback::Code(code),
        _ => Callback::Ignored,
    }
}

/// Address the redirect URI points at
pub fn callback_addr(redirect_uri: &str) -> Result<SocketAddr, ProviderError> {
    let url = url::Url::parse(redirect_uri)
        .map_err(|e| ProviderError::Config(format!("invalid redirect URI: {}", e)))?;
    let host = match url.host_str() {
        Some("localhost") | None => "127.0.0.1",
        Some(host) => host,
    };
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ProviderError::Config("redirect URI has no port".to_string()))?;
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ProviderError::Config(format!("invalid redirect address: {}", e)))
}

/// Accept connections on the redirect address until one carries the code or an error
pub async fn wait_for_code(
    addr: SocketAddr,
    expected_state: &str,
) -> Result<String, ProviderError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ProviderError::Auth(format!("failed to bind {}: {}", addr, e)))?;
    tracing::info!("OAuth callback server listening on {}", addr);

    loop {
        let (socket, _) = listener
            .accept()
            .await
            .map_err(|e| ProviderError::Auth(format!("error accepting connection: {}", e)))?;

        match handle_request(socket, expected_state).await {
            Callback::Code(code) => {
                tracing::info!("OAuth callback received");
                return Ok(code);
            }
            Callback::Denied(reason) => {
                return Err(ProviderError::Auth(format!("authorization denied: {}", reason)));
            }
            Callback::Ignored => continue,
        }
    }
}

async fn handle_request(socket: TcpStream, expected_state: &str) -> Callback {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();

    if let Err(e) = reader.read_line(&mut request_line).await {
        tracing::warn!("Failed to read callback request: {}", e);
        return Callback::Ignored;
    }

    let callback = parse_callback(&request_line, expected_state);
    let response = match &callback {
        Callback::Code(_) => html_response("200 OK", SUCCESS_PAGE),
        Callback::Denied(_) => html_response("400 Bad Request", FAILURE_PAGE),
        Callback::Ignored => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_string(),
    };

    let _ = writer.write_all(response.as_bytes()).await;
    let _ = writer.flush().await;
    callback
}

fn html_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

/// Make sure the provider holds a token: reuse the cache, otherwise run the browser flow.
///
/// `show_url` receives the authorize URL the user has to open.
pub async fn sign_in(
    provider: &SpotifyProvider,
    redirect_uri: &str,
    show_url: impl FnOnce(&str),
) -> Result<(), ProviderError> {
    if provider.restore_session().await? {
        return Ok(());
    }

    let url = provider.authorize_url()?;
    let addr = callback_addr(redirect_uri)?;
    show_url(&url);

    let code = tokio::time::timeout(CALLBACK_TIMEOUT, wait_for_code(addr, provider.oauth_state()))
        .await
        .map_err(|_| ProviderError::Auth("timed out waiting for the browser".to_string()))??;

    provider.authenticate_with_code(&code).await
}
