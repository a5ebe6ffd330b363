use crate::toy_core::{ToyBaker, ToyCore, ToyDevices, probe_grid};
use anyhow::Result;
use phonosync::bake::BakeProgress;
use phonosync::math::{Mat4, Pose, Quat, Vec3};
use phonosync::{
    BakeDesc, BakeJobRunner, BakePoll, BakeTask, DeviceSet, DirectoryStore, EndpointKind, MeshId,
    RealtimeScheduler, ReflectionEffectType, ReflectionsPhase, SceneStage, SceneType,
    SimulationDesc, SimulationFlags, SimulationInputs,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_micros(16_667);

/// Two seconds of a 60 Hz frame loop with a listener walking past two emitters.
pub fn run_realtime() -> Result<()> {
    let requested = SimulationDesc::new()
        .scene_type(SceneType::RadeonRays)
        .reflection_effect_type(ReflectionEffectType::TrueAudioNext);
    let devices = DeviceSet::initialize(&requested, &mut ToyDevices);
    log::info!(
        "Using {:?} scene with {:?} reflections ({} device failures)",
        devices.scene_type(),
        devices.reflection_effect_type(),
        devices.failures().len()
    );

    let core = Arc::new(ToyCore::new(Duration::from_millis(40)));
    let mut scheduler = RealtimeScheduler::new(core, devices.apply(requested))?;

    for id in 0..4 {
        let transform = Mat4::from_translation(Vec3::new(id as f32 * 4.0, 0.0, -6.0));
        scheduler.scene().add_mesh(MeshId(id), transform);
    }
    scheduler.add_probe_batch("demo-hall");

    let emitters = [Vec3::new(-3.0, 0.0, -2.0), Vec3::new(5.0, 1.0, -4.0)]
        .into_iter()
        .map(|position| {
            scheduler.activate(
                EndpointKind::Source,
                SimulationFlags::all(),
                SimulationInputs::at(&Pose::from_position(position)),
            )
        })
        .collect::<phonosync::Result<Vec<_>>>()?;
    let listener = scheduler.activate(
        EndpointKind::Listener,
        SimulationFlags::REFLECTIONS,
        SimulationInputs::default(),
    )?;

    let mut busy = 0;
    for frame in 0..120 {
        let t = frame as f32 * FRAME.as_secs_f32();
        let pose = Pose::new(
            Vec3::new(-4.0 + 4.0 * t, 1.7, 0.0),
            Quat::from_rotation_y(0.3 * t),
        );
        scheduler.set_listener_pose(pose);
        listener.set_inputs(SimulationInputs::at(&pose));

        let started = Instant::now();
        let report = scheduler.tick(FRAME);
        let elapsed = started.elapsed();

        if let Err(e) = report.direct {
            log::warn!("Frame {}: direct pass failed: {}", frame, e);
        }
        if report.reflections == ReflectionsPhase::WorkerBusy {
            busy += 1;
        }
        if report.consumed {
            let reverb = listener.outputs().reflections;
            log::info!(
                "Frame {:3}: tick {:?}, listener RT60 {:.2}s (pass {})",
                frame,
                elapsed,
                reverb.reverb_times[1],
                reverb.pass
            );
            for emitter in &emitters {
                let outputs = emitter.outputs();
                log::info!(
                    "  {}: attenuation {:.3}, reflected energy {:.3}",
                    emitter.id(),
                    outputs.direct.distance_attenuation,
                    outputs.reflections.energy
                );
            }
        }

        std::thread::sleep(FRAME.saturating_sub(started.elapsed()));
    }

    log::info!("Skipped {} reflection updates while the worker was busy", busy);
    for emitter in &emitters {
        scheduler.deactivate(emitter);
    }
    scheduler.deactivate(&listener);
    scheduler.shutdown();
    Ok(())
}

/// Bakes reverb and pathing for a small hall, optionally cancelling part way.
pub fn run_bake(cancel_after: Option<Duration>) -> Result<()> {
    let dir = std::env::temp_dir().join("phonosync-demo-bake");
    let store = Arc::new(DirectoryStore::open(&dir)?);
    let mut runner = BakeJobRunner::new(BakeDesc::default(), store)?;

    let scene = SceneStage::new("demo-hall");
    scene.add_mesh(MeshId(1), Mat4::IDENTITY);

    let ground = Arc::new(probe_grid("ground", Vec3::ZERO, 4, 2.0));
    let gallery = Arc::new(probe_grid("gallery", Vec3::new(0.0, 4.0, 0.0), 3, 2.0));
    let tasks = vec![
        BakeTask::reverb("Hall", vec![Some(ground.clone()), None, Some(gallery.clone())]),
        BakeTask::reverb_point("Stage", Vec3::new(0.0, 1.5, -8.0)),
        BakeTask::pathing("Hall", vec![Some(ground.clone())]),
    ];

    let engine = Arc::new(ToyBaker::new(Duration::from_millis(15), 4096));
    runner.begin_bake(engine, &scene, tasks)?;

    let started = Instant::now();
    let summary = loop {
        for event in runner.poll_events() {
            if event.is_warning() {
                log::warn!("{:?}", event);
            } else {
                log::debug!("{:?}", event);
            }
        }

        if cancel_after.is_some_and(|after| started.elapsed() >= after) {
            if let Some(summary) = runner.cancel() {
                break summary;
            }
        }

        match runner.poll() {
            BakePoll::Finished(summary) => break summary,
            BakePoll::InProgress(progress) => log_progress(&progress),
            BakePoll::Idle => anyhow::bail!("bake ended without a summary"),
        }
        std::thread::sleep(Duration::from_millis(100));
    };

    log::info!(
        "Bake {:?}: {} baked, {} skipped, {} bytes in {}",
        summary.outcome,
        summary.baked_units,
        summary.skipped_units,
        summary.persisted_bytes,
        dir.display()
    );
    log::info!(
        "Layers: ground {}, gallery {}",
        ground.layer_count(),
        gallery.layer_count()
    );
    Ok(())
}

fn log_progress(progress: &BakeProgress) {
    log::info!(
        "Task {}/{}, batch {}/{}: {:.0}%",
        progress.current_task + 1,
        progress.total_tasks,
        progress.current_batch + 1,
        progress.total_batches,
        progress.fraction * 100.0
    );
}
