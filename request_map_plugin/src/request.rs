use crate::catalog::MapCatalog;
use crate::command::{Command, Selector};
use crate::config::PluginConfig;
use crate::timer::{TimerHandle, TimerScheduler};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Idle,
    Pending,
    Approved,
}

/// Map chosen by the requester, captured when the request was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedMap {
    pub index: usize,
    pub internal_name: String,
    pub mode: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct RequestState {
    pub status: RequestStatus,
    pub requested_map: Option<RequestedMap>,
    pub requester: Option<String>,
    pub approvals: u32,
    pub approve_at: Option<Instant>,
    pub cooldown_until: Option<Instant>,
    pub pending_timer: Option<TimerHandle>,
    pub switch_timer: Option<TimerHandle>,
    /// Bumped on every reset; timers from an older epoch are ignored.
    pub epoch: u64,
}

impl Default for RequestState {
    fn default() -> Self {
        Self {
            status: RequestStatus::Idle,
            requested_map: None,
            requester: None,
            approvals: 0,
            approve_at: None,
            cooldown_until: None,
            pending_timer: None,
            switch_timer: None,
            epoch: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    VoteTimeout,
    MapSwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimer {
    pub kind: TimerKind,
    pub epoch: u64,
}

/// Side effect to be carried out by the host once a transition is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Broadcast(String),
    Tell { player: String, text: String },
    SwitchTo { index: usize },
    QueryMapIndices,
}

/// Inputs owned by the caller that a transition may read.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub now: Instant,
    pub catalog: &'a MapCatalog,
    pub player_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct VoteRules {
    pub vote_duration: Duration,
    pub map_switch_delay: Duration,
    pub cooldown_delay: Duration,
    pub approve_threshold: u32,
}

impl From<&PluginConfig> for VoteRules {
    fn from(cfg: &PluginConfig) -> Self {
        Self {
            vote_duration: cfg.vote_duration(),
            map_switch_delay: cfg.map_switch_delay(),
            cooldown_delay: cfg.cooldown_delay(),
            approve_threshold: cfg.approve_threshold.max(1),
        }
    }
}

pub struct RequestMachine {
    rules: VoteRules,
    state: RequestState,
    timers: TimerScheduler<RequestTimer>,
}

impl RequestMachine {
    pub fn new(rules: VoteRules) -> Self {
        Self {
            rules,
            state: RequestState::default(),
            timers: TimerScheduler::new(),
        }
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn armed_timers(&self) -> usize {
        self.timers.armed_count()
    }

    pub fn handle(&mut self, ctx: Context<'_>, player: &str, command: Command) -> Vec<Effect> {
        match command {
            Command::ShowMaps => show_maps(ctx.catalog, player),
            Command::RequestMap(selector) => self.request_map(ctx, player, &selector),
            Command::Approve => self.approve(ctx, player),
            Command::Abort => self.abort(player),
            Command::None => Vec::new(),
        }
    }

    /// Delivers every timer due at `ctx.now`.
    pub fn fire_due(&mut self, ctx: Context<'_>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for (handle, timer) in self.timers.fire_due(ctx.now) {
            effects.extend(self.on_timer(ctx, handle, timer));
        }
        effects
    }

    /// Drops the open request, its timers and the cooldown.
    pub fn disable(&mut self) {
        self.reset();
        self.timers.cancel_all();
        self.state.cooldown_until = None;
        info!("request state cleared");
    }

    fn request_map(&mut self, ctx: Context<'_>, player: &str, selector: &Selector) -> Vec<Effect> {
        if self.state.status != RequestStatus::Idle {
            debug!(player, "request ignored, another one is open");
            return Vec::new();
        }

        if let Some(until) = self.state.cooldown_until {
            if ctx.now < until {
                debug!(player, "request rejected, cooldown active");
                return vec![tell(player, "Please wait a moment before new request!")];
            }
        }

        let Some(index) = ctx.catalog.resolve(selector) else {
            debug!(player, ?selector, "request rejected, map not found");
            return vec![tell(player, "Requested map was not found!")];
        };
        let Some(entry) = ctx.catalog.get(index) else {
            return vec![tell(player, "Requested map was not found!")];
        };
        let requested = RequestedMap {
            index,
            internal_name: entry.internal_name.clone(),
            mode: entry.mode.clone(),
            label: crate::catalog::entry_label(entry),
        };

        let (Some(approve_at), Some(cooldown_until)) = (
            ctx.now.checked_add(self.rules.vote_duration),
            ctx.now.checked_add(self.rules.cooldown_delay),
        ) else {
            warn!(player, "request rejected, vote window overflows the clock");
            return Vec::new();
        };

        let epoch = self.state.epoch;
        let handle = self.timers.schedule(
            ctx.now,
            self.rules.vote_duration,
            RequestTimer {
                kind: TimerKind::VoteTimeout,
                epoch,
            },
        );

        info!(player, map = %requested.label, index, "map requested");
        let text = format!("{player} requested {}", requested.label);

        self.state.status = RequestStatus::Pending;
        self.state.requester = Some(player.to_string());
        self.state.requested_map = Some(requested);
        self.state.approvals = 0;
        self.state.approve_at = Some(approve_at);
        self.state.cooldown_until = Some(cooldown_until);
        self.state.pending_timer = Some(handle);

        vec![Effect::Broadcast(text)]
    }

    fn approve(&mut self, ctx: Context<'_>, player: &str) -> Vec<Effect> {
        match self.state.status {
            RequestStatus::Idle => {
                return vec![tell(player, "There is no ongoing map request!")];
            }
            RequestStatus::Approved => {
                return vec![tell(player, "Request was already approved!")];
            }
            RequestStatus::Pending => {}
        }

        let threshold = self.rules.approve_threshold;
        let own_request = self.state.requester.as_deref() == Some(player);
        if own_request && ctx.player_count != threshold {
            debug!(player, "self approval rejected");
            return vec![tell(player, "You cannot approve your own request!")];
        }

        self.state.approvals += 1;
        info!(player, approvals = self.state.approvals, threshold, "request approved");
        let mut effects = vec![Effect::Broadcast(format!("Request was approved by {player}"))];

        if self.state.approvals >= threshold {
            if let Some(h) = self.state.pending_timer.take() {
                self.timers.cancel(h);
            }
            let handle = self.timers.schedule(
                ctx.now,
                self.rules.map_switch_delay,
                RequestTimer {
                    kind: TimerKind::MapSwitch,
                    epoch: self.state.epoch,
                },
            );
            self.state.switch_timer = Some(handle);
            self.state.status = RequestStatus::Approved;

            info!("requested map was approved");
            effects.push(Effect::Broadcast(format!(
                "Next map will load in {} seconds...",
                self.rules.map_switch_delay.as_secs()
            )));
        }
        effects
    }

    fn abort(&mut self, player: &str) -> Vec<Effect> {
        if self.state.status == RequestStatus::Idle {
            return vec![tell(player, "There is no ongoing map request!")];
        }
        if self.state.requester.as_deref() != Some(player) {
            debug!(player, "abort rejected, not the requester");
            return vec![tell(player, "You didn't create current request!")];
        }

        info!(player, "request aborted");
        self.reset();
        vec![Effect::Broadcast(format!("Request was aborted by {player}"))]
    }

    fn on_timer(&mut self, ctx: Context<'_>, handle: TimerHandle, timer: RequestTimer) -> Vec<Effect> {
        if timer.epoch != self.state.epoch {
            debug!(?timer, "stale timer dropped");
            return Vec::new();
        }

        match timer.kind {
            TimerKind::VoteTimeout => {
                if self.state.status != RequestStatus::Pending
                    || self.state.pending_timer != Some(handle)
                {
                    debug!(?timer, "vote timeout no longer armed");
                    return Vec::new();
                }
                self.state.pending_timer = None;

                let text = format!(
                    "Map request was not approved in time ({}/{})",
                    self.state.approvals, self.rules.approve_threshold
                );
                info!(approvals = self.state.approvals, "request expired");
                self.reset();
                vec![Effect::Broadcast(text)]
            }
            TimerKind::MapSwitch => {
                if self.state.status != RequestStatus::Approved
                    || self.state.switch_timer != Some(handle)
                {
                    debug!(?timer, "map switch no longer armed");
                    return Vec::new();
                }
                self.state.switch_timer = None;

                let mut effects = Vec::new();
                if let Some(requested) = self.state.requested_map.as_ref() {
                    match ctx.catalog.find(&requested.internal_name, &requested.mode) {
                        Some(index) => {
                            info!(map = %requested.label, index, "loading requested map");
                            effects.push(Effect::SwitchTo { index });
                        }
                        None => {
                            warn!(map = %requested.label, "requested map left the rotation");
                            effects.push(Effect::Broadcast(
                                "Requested map is no longer available!".to_string(),
                            ));
                        }
                    }
                }
                self.reset();
                effects.push(Effect::QueryMapIndices);
                effects
            }
        }
    }

    fn reset(&mut self) {
        if let Some(h) = self.state.pending_timer.take() {
            self.timers.cancel(h);
        }
        if let Some(h) = self.state.switch_timer.take() {
            self.timers.cancel(h);
        }
        self.state.status = RequestStatus::Idle;
        self.state.requested_map = None;
        self.state.requester = None;
        self.state.approvals = 0;
        self.state.approve_at = None;
        self.state.epoch += 1;
    }
}

fn show_maps(catalog: &MapCatalog, player: &str) -> Vec<Effect> {
    if catalog.is_empty() {
        return vec![tell(player, "There is currently no maps in playlist!")];
    }

    let mut effects = Vec::with_capacity(catalog.len() + 1);
    effects.push(tell(player, "*** Available maps to request ***"));
    for (i, entry) in catalog.iter().enumerate() {
        effects.push(tell(
            player,
            &format!("* !request {i}: {}", crate::catalog::entry_label(entry)),
        ));
    }
    effects
}

fn tell(player: &str, text: &str) -> Effect {
    Effect::Tell {
        player: player.to_string(),
        text: text.to_string(),
    }
}
