//! Prompt templates for the agent runtime.
//!
//! Templates are compiled once into a process-wide `minijinja`
//! environment. Everything the agent knows this cycle flows in through
//! the render context; nothing is concatenated ad hoc at call sites.

use std::sync::OnceLock;

use minijinja::{Environment, context};

use universalis_types::{Actor, Environment as WorldEnvironment, PerceptionSphere};

/// The intent prompt shown to every actor each cycle.
const INTENT_TEMPLATE: &str = "\
You are {{ role }} (ID: {{ actor_id }}).
Description: {{ description }}
Objectives:
{% for objective in objectives %}- {{ objective }}
{% else %}- None
{% endfor %}
Assets under command:
{% for asset in controlled_assets %}- {{ asset.name }} ({{ asset.asset_id }}, status: {{ asset.status }})
{% else %}- None
{% endfor %}
Current Situation:
- Cycle: {{ cycle }}
- Time: {{ time }}
- Weather: {{ weather }}
- Terrain here: {{ terrain }}
- Nearby actors: {% if nearby_actors %}{{ nearby_actors | join(', ') }}{% else %}none{% endif %}
- Nearby assets: {% if nearby_assets %}{{ nearby_assets | join(', ') }}{% else %}none{% endif %}
- Recent Events:
{% for event in recent_events %}- {{ event }}
{% else %}- None
{% endfor %}
{% if memories %}Relevant memories:
{% for memory in memories %}- {{ memory }}
{% endfor %}
{% endif %}\
Based on your role and the situation, what is your strategic intent for \
this cycle? Answer in one concise paragraph. Refer to your assets by name \
if moving them.";

fn environment() -> &'static Environment<'static> {
    static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();
    ENVIRONMENT.get_or_init(|| {
        let mut env = Environment::new();
        // The template literal above is valid by construction; a failure
        // here is a programming error caught by the template tests.
        let _ = env.add_template("intent", INTENT_TEMPLATE);
        env
    })
}

/// Render the intent prompt for one actor.
///
/// # Errors
///
/// Returns a [`minijinja::Error`] if rendering fails.
pub fn render_intent_prompt(
    actor: &Actor,
    world_env: &WorldEnvironment,
    sphere: &PerceptionSphere,
    memories: &[String],
) -> Result<String, minijinja::Error> {
    let template = environment().get_template("intent")?;
    let nearby_actors: Vec<&str> = sphere
        .nearby_actors
        .iter()
        .map(|entity| entity.name.as_str())
        .collect();
    let nearby_assets: Vec<&str> = sphere
        .nearby_assets
        .iter()
        .map(|entity| entity.name.as_str())
        .collect();
    let terrain = sphere.terrain.as_ref().map_or_else(
        || String::from("unknown"),
        |summary| {
            format!(
                "{} ({}, movement cost {}, {})",
                summary.name,
                summary.terrain_type,
                summary.movement_cost,
                if summary.passable { "passable" } else { "impassable" }
            )
        },
    );

    template.render(context! {
        actor_id => actor.actor_id,
        role => actor.role,
        description => actor.description,
        objectives => actor.objectives,
        controlled_assets => sphere.controlled_assets,
        cycle => world_env.cycle,
        time => world_env.time,
        weather => world_env.weather,
        terrain => terrain,
        nearby_actors => nearby_actors,
        nearby_assets => nearby_assets,
        recent_events => sphere.recent_events,
        memories => memories,
    })
}

/// Build the associative-memory query for one actor: role, objectives,
/// and the freshest perceived events.
pub fn memory_query(actor: &Actor, sphere: &PerceptionSphere) -> String {
    let mut parts: Vec<&str> = vec![actor.role.as_str()];
    parts.extend(actor.objectives.iter().map(String::as_str));
    parts.extend(sphere.recent_events.iter().map(String::as_str));
    parts.join(" ")
}
