//! Sound effects. Gameplay code fires `SfxEvent`s and forgets about them; this module owns the
//! preloaded handles and turns each event into a one-shot audio entity.
//!
//! Bevy's asset system reference-counts handles; when the last handle is dropped, the underlying
//! audio buffer is released. The `AudioHandles` resource keeps the clips alive for the whole run.

use bevy::prelude::*;

use crate::state::{FrameSet, GameState};

/// Registers the audio loading system, the event channel, and the playback system.
pub struct GameAudioPlugin;

impl Plugin for GameAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioHandles>()
            .add_event::<SfxEvent>()
            .add_systems(OnEnter(GameState::Loading), load_audio_handles)
            // Runs once per frame after outcome resolution, so events fired from both `Update`
            // and `PostUpdate` are heard in the frame that raised them.
            .add_systems(PostUpdate, play_sound_effects.after(FrameSet::Resolve));
    }
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfxEvent {
    /// An enemy was destroyed by the player.
    Kill,
    /// The player lost a contact and took damage.
    Fail,
    GrappleAttach,
    Jump,
}

/// Resource that stores optional handles to game-wide audio clips. Each `Handle` is a cheap,
/// cloneable pointer into Bevy's asset storage.
#[derive(Resource, Default)]
pub struct AudioHandles {
    pub kill: Option<Handle<AudioSource>>,
    pub fail: Option<Handle<AudioSource>>,
    pub grapple: Option<Handle<AudioSource>>,
    pub jump: Option<Handle<AudioSource>>,
}

impl AudioHandles {
    fn clip(&self, event: SfxEvent) -> Option<&Handle<AudioSource>> {
        match event {
            SfxEvent::Kill => self.kill.as_ref(),
            SfxEvent::Fail => self.fail.as_ref(),
            SfxEvent::GrappleAttach => self.grapple.as_ref(),
            SfxEvent::Jump => self.jump.as_ref(),
        }
    }
}

/// Queues the clip loads once. Missing files only produce a load failure in the log; playback of
/// a handle that never loaded is silent.
fn load_audio_handles(asset_server: Res<AssetServer>, mut handles: ResMut<AudioHandles>) {
    if handles.kill.is_some() {
        return;
    }

    handles.kill = Some(asset_server.load("audio/kill.ogg"));
    handles.fail = Some(asset_server.load("audio/fail.ogg"));
    handles.grapple = Some(asset_server.load("audio/grapple.ogg"));
    handles.jump = Some(asset_server.load("audio/jump.ogg"));

    info!("Queued sound effects from assets/audio/.");
}

fn play_sound_effects(
    mut commands: Commands,
    mut events: EventReader<SfxEvent>,
    handles: Res<AudioHandles>,
) {
    for event in events.read() {
        let Some(source) = handles.clip(*event) else {
            continue;
        };
        commands.spawn(AudioBundle {
            source: source.clone(),
            settings: PlaybackSettings::DESPAWN,
        });
    }
}
