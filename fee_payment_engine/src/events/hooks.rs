use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{ContractActivatedEvent, EventHandler, EventProducer, Handler, Notification};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub notification_producer: Vec<EventProducer<Notification>>,
    pub contract_activated_producer: Vec<EventProducer<ContractActivatedEvent>>,
}

impl EventProducers {
    pub async fn publish_notification(&self, notification: Notification) {
        for emitter in &self.notification_producer {
            trace!("📬️ Notifying {} ({:?})", notification.recipient_id, notification.kind);
            emitter.publish_event(notification.clone()).await;
        }
    }

    pub async fn publish_contract_activated(&self, event: ContractActivatedEvent) {
        for emitter in &self.contract_activated_producer {
            trace!("📬️ Publishing activation of contract {}", event.contract.contract_id);
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_notification: Option<EventHandler<Notification>>,
    pub on_contract_activated: Option<EventHandler<ContractActivatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_notification = hooks.on_notification.map(|f| EventHandler::new(buffer_size, f));
        let on_contract_activated = hooks.on_contract_activated.map(|f| EventHandler::new(buffer_size, f));
        Self { on_notification, on_contract_activated }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_notification {
            result.notification_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_contract_activated {
            result.contract_activated_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_notification {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_contract_activated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_notification: Option<Handler<Notification>>,
    pub on_contract_activated: Option<Handler<ContractActivatedEvent>>,
}

impl EventHooks {
    pub fn on_notification<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(Notification) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_notification = Some(Arc::new(f));
        self
    }

    pub fn on_contract_activated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ContractActivatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_contract_activated = Some(Arc::new(f));
        self
    }
}
