use crate::UserId;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum VoteType {
    Like,
    Dislike,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Vote {
    pub user_id: UserId,
    pub vote_type: VoteType,
}

impl Vote {
    /// Applies `user`'s click on `vote_type` to a vote set
    ///
    /// Voting the same direction again removes the vote, voting the other
    /// direction replaces it. Order of the other votes is preserved and new
    /// votes go last.
    pub fn toggle(votes: &mut Vec<Vote>, user: UserId, vote_type: VoteType) {
        match votes.iter().position(|v| v.user_id == user) {
            Some(i) if votes[i].vote_type == vote_type => {
                votes.remove(i);
            }
            Some(i) => votes[i].vote_type = vote_type,
            None => votes.push(Vote {
                user_id: user,
                vote_type,
            }),
        }
    }

    pub fn of_user(votes: &[Vote], user: &UserId) -> Option<VoteType> {
        votes
            .iter()
            .find(|v| v.user_id == *user)
            .map(|v| v.vote_type)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Tally {
    pub likes: usize,
    pub dislikes: usize,
}

impl Tally {
    pub fn of(votes: &[Vote]) -> Tally {
        let mut res = Tally::default();
        for v in votes {
            match v.vote_type {
                VoteType::Like => res.likes += 1,
                VoteType::Dislike => res.dislikes += 1,
            }
        }
        res
    }
}
