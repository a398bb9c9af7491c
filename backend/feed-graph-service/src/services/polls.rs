use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::load_post;
use crate::clock::Clock;
use crate::domain::poll::{validate_selection, PollState};
use crate::domain::post::Post;
use crate::error::{FeedError, FeedResult};
use crate::metrics::{record_operation, record_vote_rejected};
use crate::profiles::ProfileResolver;
use crate::repository::FeedGraphStore;

/// Poll Voting Engine.
///
/// The duplicate-vote check and the vote write are separate transactions.
/// Two concurrent first votes by the same user can both pass the check; the
/// write drops any earlier VOTED edge, so the later one wins.
#[derive(Clone)]
pub struct PollService {
    store: Arc<dyn FeedGraphStore>,
    profiles: Arc<dyn ProfileResolver>,
    clock: Arc<dyn Clock>,
}

impl PollService {
    pub fn new(
        store: Arc<dyn FeedGraphStore>,
        profiles: Arc<dyn ProfileResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            profiles,
            clock,
        }
    }

    /// Cast `acting_user`'s vote and return the poll with fresh results
    pub async fn vote_post(
        &self,
        post_id: i64,
        selected_options: Vec<String>,
        acting_user: Uuid,
    ) -> FeedResult<Post> {
        record_operation(
            "vote_post",
            self.vote(post_id, selected_options, acting_user).await,
        )
    }

    /// Current results of a poll as seen by `viewer`
    pub async fn poll_results(&self, post_id: i64, viewer: Uuid) -> FeedResult<Post> {
        let node = self
            .store
            .get_poll(post_id)
            .await?
            .ok_or_else(|| FeedError::not_found("Poll"))?;
        load_post(self.store.as_ref(), node, viewer).await
    }

    async fn vote(
        &self,
        post_id: i64,
        selected_options: Vec<String>,
        acting_user: Uuid,
    ) -> FeedResult<Post> {
        self.profiles.resolve(acting_user).await?;

        let poll = self
            .store
            .get_poll(post_id)
            .await?
            .ok_or_else(|| FeedError::not_found("Poll"))?;

        let (voting_type, options) = match poll.poll_settings() {
            Ok((voting_type, _, options)) => (voting_type, options.to_vec()),
            Err(e) => {
                error!(post_id, error = ?e, "Stored poll is malformed, vote refused");
                return Err(FeedError::not_found("Poll"));
            }
        };

        let now = self.clock.now();
        if poll.poll_state(now)? == PollState::Closed {
            record_vote_rejected("expired");
            return Err(FeedError::validation("The poll was expired"));
        }

        if let Err(rejection) = validate_selection(voting_type, &options, &selected_options) {
            record_vote_rejected(rejection.reason());
            return Err(FeedError::validation(rejection.to_string()));
        }

        if self.store.find_vote(post_id, acting_user).await?.is_some() {
            record_vote_rejected("already_voted");
            return Err(FeedError::conflict("Already voted"));
        }

        let Some(poll) = self
            .store
            .replace_vote(post_id, acting_user, &selected_options, now)
            .await?
        else {
            warn!(post_id, user_id = %acting_user, "Poll disappeared before the vote was written");
            return Err(FeedError::not_found("Poll"));
        };

        info!(post_id, user_id = %acting_user, options = ?selected_options, "Vote recorded");
        load_post(self.store.as_ref(), poll, acting_user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, MockClock};
    use crate::domain::post::{PollDuration, PollSettings, PostInput, PostProperties, VotingType};
    use crate::domain::profile::Profile;
    use crate::profiles::MockProfileResolver;
    use crate::repository::InMemoryFeedStore;
    use chrono::{Duration, TimeZone, Utc};

    fn sel(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn setup(
        voting_type: VotingType,
    ) -> (Arc<InMemoryFeedStore>, Arc<ManualClock>, PollService, i64) {
        let store = Arc::new(InMemoryFeedStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));

        let mut profiles = MockProfileResolver::new();
        profiles
            .expect_resolve()
            .returning(|id| Ok(Profile::personal(id, "Alan", "Turing", None, None)));

        let owner = Uuid::new_v4();
        let input = PostInput::poll(
            "Favourite?",
            PollSettings::new(voting_type, PollDuration::OneWeek, &["red", "green", "blue"]),
        );
        let props = PostProperties::from_input(
            &input,
            &Profile::personal(owner, "Alan", "Turing", None, None),
            clock.now(),
        );
        let poll = store.create_post(&props).await.unwrap();

        let service = PollService::new(store.clone(), Arc::new(profiles), clock.clone());
        (store, clock, service, poll.id)
    }

    #[tokio::test]
    async fn test_vote_returns_tally_for_voter() {
        let (_, _, service, poll_id) = setup(VotingType::MultiVote).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        service.vote_post(poll_id, sel(&["red", "blue"]), alice).await.unwrap();
        let post = service.vote_post(poll_id, sel(&["blue"]), bob).await.unwrap();

        let options = &post.poll().unwrap().options;
        let counts: Vec<i64> = options.iter().map(|o| o.count).collect();
        let chosen: Vec<bool> = options.iter().map(|o| o.chosen).collect();
        assert_eq!(counts, vec![1, 0, 2]);
        assert_eq!(chosen, vec![false, false, true]);
    }

    #[tokio::test]
    async fn test_second_vote_conflicts_and_keeps_first() {
        let (store, _, service, poll_id) = setup(VotingType::SingleVote).await;
        let voter = Uuid::new_v4();

        service.vote_post(poll_id, sel(&["green"]), voter).await.unwrap();
        let err = service
            .vote_post(poll_id, sel(&["red"]), voter)
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::Conflict(ref msg) if msg == "Already voted"));
        assert_eq!(store.find_vote(poll_id, voter).await.unwrap(), Some(sel(&["green"])));
        assert_eq!(store.vote_edges(poll_id, voter).await, 1);
    }

    #[tokio::test]
    async fn test_closed_poll_rejects_votes() {
        let (_, clock, service, poll_id) = setup(VotingType::SingleVote).await;
        clock.advance(Duration::days(7));

        let err = service
            .vote_post(poll_id, sel(&["red"]), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Validation(ref msg) if msg == "The poll was expired"));
    }

    #[tokio::test]
    async fn test_expiry_checked_before_selection() {
        let (_, clock, service, poll_id) = setup(VotingType::SingleVote).await;
        clock.advance(Duration::days(8));

        let err = service
            .vote_post(poll_id, sel(&["purple"]), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Validation(ref msg) if msg.contains("expired")));
    }

    #[tokio::test]
    async fn test_selection_rules() {
        let (_, _, single, single_id) = setup(VotingType::SingleVote).await;
        let err = single
            .vote_post(single_id, sel(&["red", "green"]), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));

        let (_, _, multi, multi_id) = setup(VotingType::MultiVote).await;
        for bad in [sel(&[]), sel(&["pink"]), sel(&["red", "red"])] {
            let err = multi
                .vote_post(multi_id, bad, Uuid::new_v4())
                .await
                .unwrap_err();
            assert!(matches!(err, FeedError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_vote_on_text_post_is_not_found() {
        let (store, clock, service, _) = setup(VotingType::SingleVote).await;
        let owner = Uuid::new_v4();
        let props = PostProperties::from_input(
            &PostInput::text("not a poll"),
            &Profile::personal(owner, "A", "B", None, None),
            clock.now(),
        );
        let text = store.create_post(&props).await.unwrap();

        let err = service
            .vote_post(text.id, sel(&["red"]), owner)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_poll_refuses_vote() {
        let (store, clock, service, _) = setup(VotingType::SingleVote).await;
        let owner = Uuid::new_v4();
        let input = PostInput::poll(
            "broken",
            PollSettings::new(VotingType::SingleVote, PollDuration::OneDay, &["red"]),
        );
        let mut props = PostProperties::from_input(
            &input,
            &Profile::personal(owner, "A", "B", None, None),
            clock.now(),
        );
        props.options = None;
        let broken = store.create_post(&props).await.unwrap();

        let err = service
            .vote_post(broken.id, sel(&["red"]), owner)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::NotFound(ref what) if what == "Poll"));
        assert_eq!(store.vote_edges(broken.id, owner).await, 0);
    }

    #[tokio::test]
    async fn test_window_uses_injected_clock() {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let store = Arc::new(InMemoryFeedStore::new());
        let owner = Uuid::new_v4();
        let input = PostInput::poll(
            "Lunch?",
            PollSettings::new(VotingType::SingleVote, PollDuration::OneDay, &["soup", "salad"]),
        );
        let props = PostProperties::from_input(
            &input,
            &Profile::personal(owner, "Alan", "Turing", None, None),
            created,
        );
        let poll = store.create_post(&props).await.unwrap();

        let mut profiles = MockProfileResolver::new();
        profiles
            .expect_resolve()
            .returning(|id| Ok(Profile::personal(id, "Alan", "Turing", None, None)));

        // First call: one hour before closing. Second call: exactly at closing.
        let mut clock = MockClock::new();
        let mut seq = mockall::Sequence::new();
        clock
            .expect_now()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || created + Duration::days(1) - Duration::hours(1));
        clock
            .expect_now()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || created + Duration::days(1));

        let service = PollService::new(store.clone(), Arc::new(profiles), Arc::new(clock));

        service
            .vote_post(poll.id, sel(&["soup"]), owner)
            .await
            .unwrap();
        let err = service
            .vote_post(poll.id, sel(&["salad"]), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Validation(ref msg) if msg == "The poll was expired"));
    }
}
