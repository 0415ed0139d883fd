use dishdash_server::{
    auth::TokenIssuer,
    cli::{handle_command_line_args, CliCommand},
    config::ServerConfig,
    server::run_server,
};
use dotenvy::dotenv;
use log::info;

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    match handle_command_line_args() {
        CliCommand::Run => {},
        CliCommand::Help => return,
        CliCommand::IssueServiceToken(name) => {
            let issuer = TokenIssuer::new(&config.auth);
            match issuer.issue_service_token(&name) {
                Ok(token) => println!("{token}"),
                Err(e) => eprintln!("Could not issue a service token for {name}. {e}"),
            }
            return;
        },
    }

    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    match run_server(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
