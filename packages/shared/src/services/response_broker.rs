use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::models::interaction::PromptChoice;
use crate::models::player::PlayerIdentity;

struct PendingPrompt {
    responder: PlayerIdentity,
    sender: oneshot::Sender<PromptChoice>,
}

#[derive(Default)]
struct Prompts {
    pending: HashMap<String, PendingPrompt>,
    /// Receivers registered ahead of their waiter, keyed by prompt id.
    unclaimed: HashMap<String, oneshot::Receiver<PromptChoice>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Nobody is waiting on that prompt, either it was never posted or it already resolved.
    NotAwaited,
    /// The prompt is waiting on someone else; it stays pending.
    WrongResponder,
}

/// Rendezvous between a flow waiting on a prompt and the interaction that answers it.
///
/// A prompt is registered when it is posted, so an answer that arrives before anyone awaits
/// it is kept in its channel. Exactly one of {response, timeout} resolves each wait.
/// `deliver` sends while holding the lock and removes the entry, so a waiter that times out
/// and then finds its entry gone knows the response is already in its channel.
#[derive(Default)]
pub struct ResponseBroker {
    prompts: Mutex<Prompts>,
}

impl ResponseBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `prompt_id` for answers from `responder`.
    pub async fn register(&self, prompt_id: &str, responder: &PlayerIdentity) {
        let (sender, receiver) = oneshot::channel();
        let mut prompts = self.prompts.lock().await;
        prompts.pending.insert(
            prompt_id.to_string(),
            PendingPrompt {
                responder: responder.clone(),
                sender,
            },
        );
        prompts.unclaimed.insert(prompt_id.to_string(), receiver);
    }

    /// Waits for `responder` to answer `prompt_id`. `None` means the window elapsed.
    ///
    /// A prompt that was never registered is registered here.
    pub async fn await_response(
        &self,
        prompt_id: &str,
        responder: &PlayerIdentity,
        timeout: Duration,
    ) -> Option<PromptChoice> {
        let mut receiver = {
            let mut prompts = self.prompts.lock().await;
            match prompts.unclaimed.remove(prompt_id) {
                Some(receiver) => receiver,
                None => {
                    let (sender, receiver) = oneshot::channel();
                    prompts.pending.insert(
                        prompt_id.to_string(),
                        PendingPrompt {
                            responder: responder.clone(),
                            sender,
                        },
                    );
                    receiver
                }
            }
        };

        match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(Ok(choice)) => Some(choice),
            Ok(Err(_)) => None,
            Err(_) => {
                let mut prompts = self.prompts.lock().await;
                if prompts.pending.remove(prompt_id).is_some() {
                    debug!(prompt_id, "Prompt timed out");
                    None
                } else {
                    receiver.try_recv().ok()
                }
            }
        }
    }

    pub async fn deliver(
        &self,
        prompt_id: &str,
        user: &PlayerIdentity,
        choice: PromptChoice,
    ) -> Delivery {
        let mut prompts = self.prompts.lock().await;
        match prompts.pending.get(prompt_id) {
            None => Delivery::NotAwaited,
            Some(prompt) if &prompt.responder != user => Delivery::WrongResponder,
            Some(_) => match prompts.pending.remove(prompt_id) {
                Some(prompt) => {
                    if prompt.sender.send(choice).is_ok() {
                        Delivery::Delivered
                    } else {
                        Delivery::NotAwaited
                    }
                }
                None => Delivery::NotAwaited,
            },
        }
    }

    /// Drops a prompt nobody will wait on.
    pub async fn forget(&self, prompt_id: &str) {
        let mut prompts = self.prompts.lock().await;
        prompts.pending.remove(prompt_id);
        prompts.unclaimed.remove(prompt_id);
    }

    pub async fn is_pending(&self, prompt_id: &str) -> bool {
        self.prompts.lock().await.pending.contains_key(prompt_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    async fn wait_until_pending(broker: &ResponseBroker, prompt_id: &str) {
        while !broker.is_pending(prompt_id).await {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_before_timeout() {
        let broker = Arc::new(ResponseBroker::new());
        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .await_response("m1", &PlayerIdentity::human("2"), WINDOW)
                    .await
            })
        };
        wait_until_pending(&broker, "m1").await;

        let delivery = broker
            .deliver("m1", &PlayerIdentity::human("2"), PromptChoice::Accept)
            .await;

        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(waiter.await.unwrap(), Some(PromptChoice::Accept));
        assert!(!broker.is_pending("m1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_before_waiter_is_kept() {
        let broker = ResponseBroker::new();
        broker.register("m1", &PlayerIdentity::human("2")).await;

        let delivery = broker
            .deliver("m1", &PlayerIdentity::human("2"), PromptChoice::Decline)
            .await;

        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(
            broker
                .await_response("m1", &PlayerIdentity::human("2"), WINDOW)
                .await,
            Some(PromptChoice::Decline)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_registered_prompt_times_out() {
        let broker = ResponseBroker::new();
        broker.register("m1", &PlayerIdentity::human("2")).await;

        let outcome = broker
            .await_response("m1", &PlayerIdentity::human("2"), WINDOW)
            .await;

        assert_eq!(outcome, None);
        assert!(!broker.is_pending("m1").await);
    }

    #[tokio::test]
    async fn test_forgotten_prompt_is_not_awaited() {
        let broker = ResponseBroker::new();
        broker.register("m1", &PlayerIdentity::human("2")).await;
        broker.forget("m1").await;

        assert_eq!(
            broker
                .deliver("m1", &PlayerIdentity::human("2"), PromptChoice::Accept)
                .await,
            Delivery::NotAwaited
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_response_is_not_awaited() {
        let broker = ResponseBroker::new();

        let outcome = broker
            .await_response("m1", &PlayerIdentity::human("2"), WINDOW)
            .await;

        assert_eq!(outcome, None);
        assert_eq!(
            broker
                .deliver("m1", &PlayerIdentity::human("2"), PromptChoice::Accept)
                .await,
            Delivery::NotAwaited
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_responder_keeps_prompt_pending() {
        let broker = Arc::new(ResponseBroker::new());
        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .await_response("m1", &PlayerIdentity::human("2"), WINDOW)
                    .await
            })
        };
        wait_until_pending(&broker, "m1").await;

        assert_eq!(
            broker
                .deliver("m1", &PlayerIdentity::human("3"), PromptChoice::Accept)
                .await,
            Delivery::WrongResponder
        );
        assert!(broker.is_pending("m1").await);
        assert_eq!(
            broker
                .deliver("m1", &PlayerIdentity::human("2"), PromptChoice::Decline)
                .await,
            Delivery::Delivered
        );
        assert_eq!(waiter.await.unwrap(), Some(PromptChoice::Decline));
    }
}
