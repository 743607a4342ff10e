use embedls::create_service;
use embedls::logging::init_logging;
use tower_lsp::Server;

#[tokio::main]
async fn main() {
    init_logging();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = create_service();
    Server::new(stdin, stdout, socket).serve(service).await;
}
