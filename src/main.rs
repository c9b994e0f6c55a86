//! Affect Runner - headless session driver
//!
//! Usage: `affect-runner [settings.json] [theme.json]`
//!
//! Plays a short session against synthetic sensor input: each segment variant
//! carries a fixed "mood", so the bandit has something to learn.

use affect_runner::consts::{MAX_SUBSTEPS, SIM_DT};
use affect_runner::sim::{Emotion, EmotionSample, TickInput, Track, TrackEvent, tick};
use affect_runner::{RunSettings, ThemeData, TrackError};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Simulated seconds per run
const RUN_SECONDS: f32 = 90.0;
/// Runs per session; every second one is a rerun
const RUNS: u32 = 4;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

/// Host state carried into the next run; a fresh run starts a new character
fn input_for_run(previous: TickInput, rerun: bool) -> TickInput {
    if rerun { previous } else { TickInput::default() }
}

fn run() -> Result<(), TrackError> {
    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => RunSettings::load_or_default(path),
        None => RunSettings::default(),
    };
    let theme = match args.next() {
        Some(path) => ThemeData::load(path)?,
        None => ThemeData::demo(),
    };

    let mut sensor = Pcg32::seed_from_u64(settings.track_seed.unwrap_or(7));
    // Valence bias per variant of the first zone
    let moods: Vec<f32> = theme
        .zone(0)?
        .variants
        .iter()
        .map(|_| sensor.random_range(-40.0..40.0))
        .collect();

    let mut track = Track::new(settings);
    track.set_theme(theme)?;

    let mut input = TickInput::default();
    for game in 0..RUNS {
        let rerun = game % 2 == 1;
        input = input_for_run(input, rerun);
        track.begin(rerun);
        let mut head_id = None;
        let mut accumulator = 0.0;
        let mut elapsed = 0.0;

        while elapsed < RUN_SECONDS {
            // Uneven frame times, the way a real host delivers them
            let frame = sensor.random_range(0.008..0.04f32);
            elapsed += frame;
            accumulator += frame.min(0.1);

            let mut substeps = 0;
            while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                if let Some(head) = track.current_segment() {
                    if head_id != Some(head.id) {
                        head_id = Some(head.id);
                        input.coins += head.coins_spawned;
                    }
                    let mood = moods.get(head.variant).copied().unwrap_or(0.0);
                    input.emotions = Some(EmotionSample::from_pairs([
                        (Emotion::Valence, mood + sensor.random_range(-10.0..10.0)),
                        (Emotion::Engagement, sensor.random_range(0.0..60.0)),
                        (Emotion::Joy, sensor.random_range(0.0..100.0)),
                    ]));
                }
                input.direction_pressed = sensor.random_bool(0.02);

                tick(&mut track, &input, SIM_DT);
                accumulator -= SIM_DT;
                substeps += 1;

                for event in track.take_events() {
                    match event {
                        TrackEvent::RankUp { rank } => log::info!("Rank up: {rank}"),
                        TrackEvent::CountdownFinished => log::debug!("Go!"),
                        _ => {}
                    }
                }
            }
        }

        log::info!(
            "Run {} finished: score {}, distance {:.0}, {} segments passed",
            game + 1,
            track.score(),
            track.world_distance(),
            track.segments_passed()
        );
        if !rerun {
            // Died: the next run picks up where this one stopped
            track.stop_move();
        } else {
            track.end();
        }
    }

    if let Some(bandit) = track.bandit() {
        let n = bandit.variant_count();
        for previous in 0..n {
            let row: Vec<String> = (0..n)
                .map(|c| {
                    format!(
                        "{:.2}/{}",
                        bandit.exploit_score(previous, c),
                        bandit.explore_count(previous, c)
                    )
                })
                .collect();
            log::info!("after {previous}: {}", row.join("  "));
        }
    }
    for (i, mood) in moods.iter().enumerate() {
        log::info!("variant {i} mood {mood:.1}");
    }
    log::info!("Rank {} after {RUNS} runs", track.rank());
    Ok(())
}
