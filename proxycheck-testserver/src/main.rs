use proxycheck_testserver::{MockProxy, MockProxyOptions, TestServer, UpstreamOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr = "127.0.0.1:0".to_string();
    let mut mock_proxy = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                bind_addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
            }
            "--mock-proxy" => mock_proxy = true,
            "-h" | "--help" => {
                eprintln!(
                    "proxycheck-testserver\n\nUSAGE:\n  proxycheck-testserver [--bind 127.0.0.1:0] [--mock-proxy]\n\nOPTIONS:\n  --mock-proxy  Serve a fake proxy (rate limit, breaker, cache) instead of the bare upstream\n\nENV:\n  SUCCESS_RATE  Fraction of catch-all upstream requests that succeed (default 1.0)\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let upstream = UpstreamOptions::from_env();
    if mock_proxy {
        let options = MockProxyOptions::default().with_upstream(upstream);
        let server = MockProxy::bind(&bind_addr, options).await?;
        println!("HTTP_URL={}", server.base_url());
        let _ = tokio::signal::ctrl_c().await;
        server.shutdown().await;
    } else {
        let server = TestServer::bind(&bind_addr, upstream).await?;
        println!("HTTP_URL={}", server.base_url());
        let _ = tokio::signal::ctrl_c().await;
        server.shutdown().await;
    }

    Ok(())
}
