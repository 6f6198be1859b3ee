//=========================================================================
// Aetheric Controls: Library Root
//
// Reactive control engine: sensors sample devices, physics and scene
// state once per tick, manifolds combine them into pulses and fire
// callbacks.
//
// Responsibilities:
// - Expose the per-tick driver (`Controls`) and its builder
// - Expose the collaborator traits hosts implement (physics, scene, devices)
// - Bridge Winit window input onto the controls input queue
//
// Typical usage:
// ```no_run
// use aetheric_controls::prelude::*;
//
// let mut controls = ControlsBuilder::new().build();
// controls
//     .create_kb_sensor_manifold(Owner::Global, "JUMP", ControlType::Shot, KeyCode::Space,
//         |_, _| println!("jump"), None)
//     .unwrap();
//
// loop {
//     controls.update(0.016, 0.016);
// }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds the engine: input accumulation, sensors, manifolds and the
// update loop. `platform` holds the Winit bridge; it only produces
// `DeviceEvent`s and never touches `Controls` directly.
//
pub mod core;
pub mod platform;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------

mod builder;

//--- Public Exports ------------------------------------------------------

pub use builder::ControlsBuilder;
pub use core::Controls;
