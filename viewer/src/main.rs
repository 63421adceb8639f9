mod config;
mod http;

use {
    self::{config::Config, http::HttpTransport},
    bodyrig::{
        clocks::Clocks,
        pose::JointGroups,
        render::{HeadlessSurface, RenderLoop},
        session::{AsyncDispatcher, FileStore, ImageUpload, SessionStore},
        App, AppEvent,
    },
    color_eyre::Report,
    std::time::Instant,
    tokio::runtime::Runtime,
    tracing_subscriber::{
        layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
    },
};

fn install_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();
}

fn main() -> Result<(), Report> {
    color_eyre::install()?;
    install_tracing();

    let config = Config::load()?;
    let runtime = Runtime::new()?;

    let transport = HttpTransport::new(
        &config.engine.api.base_url,
        config.viewer.request_timeout(),
    )?;
    let dispatcher = AsyncDispatcher::new(transport, runtime.handle().clone());
    let store = FileStore::from_config(&config.engine.store);
    tracing::info!("Session record at {}", store.path().display());

    let mut app = App::new(&config.engine, dispatcher, store);

    if config.viewer.clear {
        app.clear_session();
    }
    app.restore(Instant::now());

    if let Some(path) = &config.viewer.image {
        app.upload(ImageUpload::from_path(path)?)?;
    } else if config.viewer.reprocess {
        app.reprocess()?;
    }

    if app.session().is_none() && !app.is_loading() {
        tracing::warn!("No session to follow, pass an image to submit one");
        return Ok(());
    }

    let mut render = RenderLoop::create(
        || Ok::<_, Report>(HeadlessSurface::new(config.viewer.width, config.viewer.height)),
        &config.engine.camera,
    )?;

    run(&config, &mut app, &mut render)
}

fn run<S>(
    config: &Config,
    app: &mut App<AsyncDispatcher<HttpTransport>, S>,
    render: &mut RenderLoop<HeadlessSurface>,
) -> Result<(), Report>
where
    S: SessionStore,
{
    let mut clocks = Clocks::new();
    let deadline = Instant::now() + config.viewer.timeout();
    let mut measuring = false;

    loop {
        let now = Instant::now();
        app.tick(now);

        let events: Vec<AppEvent> =
            app.events().read().map(|event| event.consume()).collect();

        for event in events {
            match event {
                AppEvent::SessionUpdated(status) => {
                    tracing::info!("Session is {}", status);
                }
                AppEvent::SceneRebuilt { persons } => {
                    render.frame_scene(app.scene());
                    for person in app.scene().persons() {
                        let groups = JointGroups::from_targets(&person.targets);
                        tracing::info!(
                            "Person {}: {} joints, {} triangles at {:?}",
                            person.index,
                            person.helpers.joint_count(),
                            person.mesh.triangle_count(),
                            person.position,
                        );
                        tracing::debug!(
                            "Person {} controls: upper {:?}, lower {:?}, hands {}/{}",
                            person.index,
                            groups.upper_body,
                            groups.lower_body,
                            groups.left_hand.len(),
                            groups.right_hand.len(),
                        );
                    }

                    if let Some(index) = config.viewer.person {
                        app.select_person(index);
                    }

                    match &config.viewer.measure {
                        Some(height) if persons > 0 => {
                            app.request_measurements(height)?;
                            measuring = true;
                        }
                        _ => return Ok(()),
                    }
                }
                AppEvent::SelectionChanged(index) => {
                    tracing::info!("Selected person {}", index);
                }
                AppEvent::Failed(message) => {
                    return Err(eyre::eyre!(message));
                }
            }
        }

        if measuring {
            if let Some(result) = app.measurement(app.selected()) {
                for (name, value) in &result.response.measurements {
                    let unit = result
                        .response
                        .schema
                        .get(name)
                        .map_or("", |schema| schema.unit.as_str());
                    tracing::info!("{}: {:.1}{}", name, value, unit);
                }
                return Ok(());
            }
            if let Some(message) = app.measurement_error() {
                return Err(eyre::eyre!(message.to_owned()));
            }
        }

        render.tick(app.scene(), &clocks.step());

        if now > deadline {
            return Err(eyre::eyre!(
                "Session did not complete within {}s",
                config.viewer.timeout
            ));
        }

        std::thread::sleep(config.viewer.frame_interval());
    }
}
