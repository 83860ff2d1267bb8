//! In-memory order repository.

use opsorder_core::error::OrderError;
use opsorder_core::repository::OrderRepository;
use opsorder_core::service::{ListFilter, OrderPage, ServiceFuture};
use opsorder_core::types::{NewOrder, Order, OrderId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory [`OrderRepository`] keyed by ascending id.
///
/// Ids start at 1 and are never reused. Saves can be made to fail on demand to exercise
/// error paths.
#[derive(Debug)]
pub struct InMemoryOrderRepository<P> {
    orders: Mutex<BTreeMap<OrderId, Order<P>>>,
    next_id: AtomicU64,
    fail_writes: AtomicBool,
}

impl<P> Default for InMemoryOrderRepository<P> {
    fn default() -> Self {
        Self {
            orders: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl<P> InMemoryOrderRepository<P> {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty repository behind an `Arc`
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following `insert`/`save` fail with an internal failure
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no orders are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<OrderId, Order<P>>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), OrderError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(OrderError::internal("simulated repository write failure"));
        }
        Ok(())
    }
}

impl<P> OrderRepository<P> for InMemoryOrderRepository<P>
where
    P: Clone + Send + Sync + 'static,
{
    fn insert(&self, order: NewOrder<P>) -> ServiceFuture<'_, Order<P>> {
        Box::pin(async move {
            self.check_writable()?;
            let id = OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
            let order = order.into_order(id);
            self.lock().insert(id, order.clone());
            Ok(order)
        })
    }

    fn get(&self, id: OrderId) -> ServiceFuture<'_, Option<Order<P>>> {
        Box::pin(async move { Ok(self.lock().get(&id).cloned()) })
    }

    fn list(&self, filter: ListFilter) -> ServiceFuture<'_, OrderPage<P>> {
        Box::pin(async move {
            let orders = self.lock();
            let matching: Vec<&Order<P>> = orders.values().filter(|o| filter.matches(o)).collect();
            let total = matching.len();
            let page = matching
                .into_iter()
                .skip(filter.offset)
                .take(filter.limit.unwrap_or(usize::MAX))
                .cloned()
                .collect();
            Ok(OrderPage {
                orders: page,
                total,
            })
        })
    }

    fn save(&self, order: Order<P>) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            self.check_writable()?;
            let mut orders = self.lock();
            match orders.get_mut(&order.id) {
                Some(stored) => {
                    *stored = order;
                    Ok(())
                },
                None => Err(OrderError::RecordNotFound { order_id: order.id }),
            }
        })
    }
}
