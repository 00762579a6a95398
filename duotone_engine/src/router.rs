//! Event Router (C2): typed events delivered through bounded, per-listener,
//! FIFO queues (spec.md §4.2), plus a direct synchronous fast path used only
//! by the MIDI ingress for high-priority events (Design Notes §9 — "the MIDI
//! fast path is a direct synchronous call, not a channel send").

use crossbeam_channel::{bounded, Receiver, Sender};
use duotone_shared::{Event, EventKind, ModuleId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Default bound for a listener's queue. Emission blocks (back-pressure) once
/// a listener's queue is full — every producer but the MIDI ingress path
/// accepts that cost.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

type RouteKey = (ModuleId, EventKind);
type DirectFn = dyn Fn(&Event) + Send + Sync;

/// A subscription handle: drain with `recv`/`try_recv`.
pub struct EventListener {
    receiver: Receiver<Event>,
}

impl EventListener {
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    pub fn iter_available(&self) -> impl Iterator<Item = Event> + '_ {
        self.receiver.try_iter()
    }
}

#[derive(Default)]
pub struct EventRouter {
    queued: Mutex<HashMap<RouteKey, Vec<Sender<Event>>>>,
    direct: RwLock<HashMap<RouteKey, Vec<Arc<DirectFn>>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event of `kind` produced by `producer`. Each
    /// producer emission is observed in emission order by every listener
    /// (FIFO, independent per-listener queue).
    pub fn subscribe(&self, producer: ModuleId, kind: EventKind) -> EventListener {
        self.subscribe_with_depth(producer, kind, DEFAULT_QUEUE_DEPTH)
    }

    pub fn subscribe_with_depth(
        &self,
        producer: ModuleId,
        kind: EventKind,
        depth: usize,
    ) -> EventListener {
        let (tx, rx) = bounded(depth.max(1));
        self.queued.lock().entry((producer, kind)).or_default().push(tx);
        EventListener { receiver: rx }
    }

    /// Register a direct, synchronous callback for the MIDI fast path. The
    /// callback runs inline on the producer's thread — it must be cheap.
    pub fn subscribe_direct<F>(&self, producer: ModuleId, kind: EventKind, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.direct
            .write()
            .entry((producer, kind))
            .or_default()
            .push(Arc::new(callback));
    }

    /// Emit through the bounded-queue path. Blocks (back-pressure) if any
    /// matching listener's queue is full.
    pub fn emit(&self, producer: ModuleId, event: Event) {
        let key = (producer, event.kind());
        let senders = {
            let queued = self.queued.lock();
            queued.get(&key).cloned_or_empty()
        };
        for sender in senders {
            // A closed receiver means the listener went away; drop silently
            // rather than treat it as a producer-visible failure (spec.md §7
            // "the event router never propagates handler failures to
            // producers").
            let _ = sender.send(event.clone());
        }
    }

    /// Emit through the direct fast path: every matching callback runs
    /// synchronously, in registration order, with no queueing.
    pub fn emit_direct(&self, producer: ModuleId, event: &Event) {
        let key = (producer, event.kind());
        let direct = self.direct.read();
        if let Some(callbacks) = direct.get(&key) {
            for cb in callbacks {
                cb(event);
            }
        }
    }
}

trait ClonedOrEmpty {
    fn cloned_or_empty(&self) -> Vec<Sender<Event>>;
}

impl ClonedOrEmpty for Option<&Vec<Sender<Event>>> {
    fn cloned_or_empty(&self) -> Vec<Sender<Event>> {
        self.map(|v| v.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duotone_shared::{ParamChange, ParamHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn listeners_see_events_in_emission_order() {
        let router = EventRouter::new();
        let listener = router.subscribe(ModuleId::Midi, EventKind::ParamChange);
        for i in 0..5u32 {
            router.emit(
                ModuleId::Midi,
                Event::ParamChange(ParamChange::new(ParamHandle(i), ModuleId::Midi)),
            );
        }
        let seen: Vec<u32> = listener
            .iter_available()
            .map(|e| match e {
                Event::ParamChange(pc) => pc.param.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn listener_only_sees_events_from_its_producer_and_kind() {
        let router = EventRouter::new();
        let listener = router.subscribe(ModuleId::Seq, EventKind::ParamChange);
        router.emit(
            ModuleId::Midi,
            Event::ParamChange(ParamChange::new(ParamHandle(1), ModuleId::Midi)),
        );
        router.emit(
            ModuleId::Seq,
            Event::ReloadPresets(Default::default()),
        );
        assert!(listener.try_recv().is_none());
    }

    #[test]
    fn direct_fast_path_runs_synchronously() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = hits.clone();
        router.subscribe_direct(ModuleId::Midi, EventKind::Midi, move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });
        router.emit_direct(
            ModuleId::Midi,
            &Event::Midi(duotone_shared::MidiEvent::new(
                duotone_shared::MidiSource::Usb,
                0,
                duotone_shared::MidiEventKind::Clock,
            )),
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
