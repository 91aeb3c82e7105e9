use std::sync::Arc;
use ridepool_core::UserRepository;
use ridepool_reservation::Marketplace;

#[derive(Clone)]
pub struct AppState {
    pub market: Marketplace,
    pub users: Arc<dyn UserRepository>,
}
