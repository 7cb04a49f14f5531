use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

/// Install the global subscriber.
///
/// `RUST_LOG` is honoured, `-v`/`-q` on the command line override its
/// default level.
pub fn setup<Level>(
    verbosity: clap_verbosity_flag::Verbosity<Level>,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError>
where
    Level: clap_verbosity_flag::LogLevel,
{
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();

    if let Some(level_filter) = verbosity
        .is_present()
        .then(|| verbosity.tracing_level_filter())
    {
        let directive = tracing_subscriber::filter::Directive::from(level_filter);
        env_filter = env_filter.add_directive(directive);
    }

    let subscriber = tracing_subscriber::registry::Registry::default().with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_filter(env_filter),
    );

    tracing::subscriber::set_global_default(subscriber)
}
