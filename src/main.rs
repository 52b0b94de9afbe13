use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gymhub::config::Config;
use gymhub::handlers::{bookings, members, schedules, sweep};
use gymhub::repositories::{BookingRepository, MemberRepository, ScheduleRepository};
use gymhub::{db, migrations, routes, sweepers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gymhub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Connecting to database: {}", config.database_url);

    // Create database pool
    let pool = db::create_pool(&config.database_url)?;

    // Run migrations
    migrations::run_migrations(&pool)?;

    // Create repositories
    let schedule_repo = ScheduleRepository::new(pool.clone());
    let booking_repo = BookingRepository::new(pool.clone());
    let member_repo = MemberRepository::new(pool.clone());

    // Create handler states
    let schedules_state = schedules::SchedulesState {
        schedule_repo: schedule_repo.clone(),
        member_repo: member_repo.clone(),
    };
    let bookings_state = bookings::BookingsState {
        booking_repo: booking_repo.clone(),
        schedule_repo: schedule_repo.clone(),
    };
    let members_state = members::MembersState {
        member_repo: member_repo.clone(),
    };
    let sweep_state = sweep::SweepState { pool: pool.clone() };

    // Start the expiry sweeps on their interval
    tracing::info!(
        "Starting expiry sweeps every {}s",
        config.sweep_interval_secs
    );
    tokio::spawn(sweepers::run_forever(
        pool.clone(),
        config.sweep_interval_secs,
    ));

    // Build router
    let app = routes::create_router(schedules_state, bookings_state, members_state, sweep_state);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Starting server at http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
