pub mod logging;
pub mod service;
pub mod token;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_GRPC_PORT: &str = "grpc-port";
pub const ARG_HTTP_PORT: &str = "http-port";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("authgate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_GRPC_PORT)
                .long(ARG_GRPC_PORT)
                .help("Port for the gRPC account service")
                .default_value("9090")
                .env("AUTHGATE_GRPC_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_HTTP_PORT)
                .short('p')
                .long(ARG_HTTP_PORT)
                .help("Port for the HTTP verification and health endpoints")
                .default_value("8080")
                .env("AUTHGATE_HTTP_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = token::with_args(command);
    let command = service::with_args(command);
    logging::with_args(command)
}
