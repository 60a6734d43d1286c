//! # Protocol Declarations
//!
//! [`actor_protocol!`](crate::actor_protocol) declares a protocol trait and generates its
//! proxy. Each method becomes a message:
//!
//! * `fn m(&mut self, args..);` - a command, delivered fire-and-forget.
//! * `fn m(&mut self, args..) -> Completes<T>;` - a query; the proxy returns a
//!   [`Completes<T>`](crate::Completes) immediately and the actor settles it later.
//!
//! Any other return type is rejected at compile time, since a value cannot be handed
//! back synchronously from a message that has not run yet.
//!
//! ```rust
//! use actor_runtime::{actor_protocol, Actor, Completes, Definition, Proxy, Stage, StageConfig};
//!
//! actor_protocol! {
//!     pub trait Counter {
//!         fn increment(&mut self, by: u64);
//!         fn value(&mut self) -> Completes<u64>;
//!     }
//! }
//!
//! #[derive(Default)]
//! struct CounterActor {
//!     count: u64,
//! }
//!
//! impl Actor for CounterActor {}
//!
//! impl Counter for CounterActor {
//!     fn increment(&mut self, by: u64) {
//!         self.count += by;
//!     }
//!
//!     fn value(&mut self) -> Completes<u64> {
//!         Completes::with(self.count)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), actor_runtime::ActorError> {
//!     let stage = Stage::builder(StageConfig::default()).start().await?;
//!     let counter: CounterProxy =
//!         stage.actor_for::<dyn Counter, _>(Definition::has(CounterActor::default()))?;
//!
//!     counter.increment(2);
//!     counter.increment(3);
//!     assert_eq!(counter.value().outcome().await, Ok(5));
//!
//!     counter.stop();
//!     stage.terminate().await;
//!     Ok(())
//! }
//! ```

/// Declares an actor protocol and its generated proxy.
///
/// Expands to the trait itself, a `<Name>Proxy` struct with one method per protocol
/// method, a [`Proxy`](crate::Proxy) impl for it, and a [`Protocol`](crate::Protocol)
/// impl for `dyn Name` covering every actor type that implements `Name`.
///
/// Arguments are moved into the message, so they must be `Send + 'static`. Query
/// results must be `Clone + Send + 'static`.
///
/// A method returning anything other than `()` or `Completes<T>` does not compile:
///
/// ```compile_fail
/// use actor_runtime::actor_protocol;
///
/// actor_protocol! {
///     pub trait Meter {
///         fn reading(&mut self) -> u64;
///     }
/// }
/// ```
#[macro_export]
macro_rules! actor_protocol {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::__actor_protocol_methods! {
            [$(#[$meta])*] [$vis] $name
            [] []
            $($body)*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __actor_protocol_methods {
    // Command.
    (
        [$($meta:tt)*] [$vis:vis] $name:ident
        [$($items:tt)*] [$($proxies:tt)*]
        $(#[$method_meta:meta])*
        fn $method:ident(&mut self $(, $arg:ident: $ty:ty)*);
        $($rest:tt)*
    ) => {
        $crate::__actor_protocol_methods! {
            [$($meta)*] [$vis] $name
            [
                $($items)*
                $(#[$method_meta])*
                fn $method(&mut self $(, $arg: $ty)*);
            ]
            [
                $($proxies)*
                $(#[$method_meta])*
                pub fn $method(&self $(, $arg: $ty)*) {
                    self.reference.send(
                        concat!(stringify!($name), "::", stringify!($method), "(", stringify!($($ty),*), ")"),
                        move |actor| actor.$method($($arg),*),
                    );
                }
            ]
            $($rest)*
        }
    };
    // Query.
    (
        [$($meta:tt)*] [$vis:vis] $name:ident
        [$($items:tt)*] [$($proxies:tt)*]
        $(#[$method_meta:meta])*
        fn $method:ident(&mut self $(, $arg:ident: $ty:ty)*) -> Completes<$ret:ty>;
        $($rest:tt)*
    ) => {
        $crate::__actor_protocol_methods! {
            [$($meta)*] [$vis] $name
            [
                $($items)*
                $(#[$method_meta])*
                fn $method(&mut self $(, $arg: $ty)*) -> $crate::Completes<$ret>;
            ]
            [
                $($proxies)*
                $(#[$method_meta])*
                pub fn $method(&self $(, $arg: $ty)*) -> $crate::Completes<$ret> {
                    self.reference.query(
                        concat!(stringify!($name), "::", stringify!($method), "(", stringify!($($ty),*), ")"),
                        move |actor| actor.$method($($arg),*),
                    )
                }
            ]
            $($rest)*
        }
    };
    // Anything else returning a value cannot cross a mailbox.
    (
        [$($meta:tt)*] [$vis:vis] $name:ident
        [$($items:tt)*] [$($proxies:tt)*]
        $(#[$method_meta:meta])*
        fn $method:ident(&mut self $(, $arg:ident: $ty:ty)*) -> $ret:ty;
        $($rest:tt)*
    ) => {
        compile_error!(concat!(
            "unsupported protocol method `",
            stringify!($name), "::", stringify!($method),
            "`: returns `", stringify!($ret),
            "`, but protocol methods must return nothing or `Completes<T>`"
        ));
    };
    (
        [$($meta:tt)*] [$vis:vis] $name:ident
        [$($items:tt)*] [$($proxies:tt)*]
    ) => {
        $($meta)*
        $vis trait $name {
            $($items)*
        }

        $crate::__private::paste! {
            #[doc = concat!("Proxy delivering [`", stringify!($name), "`] calls as messages.")]
            #[derive(Clone, Debug)]
            $vis struct [<$name Proxy>] {
                reference: $crate::ActorRef<dyn $name>,
            }

            #[allow(dead_code)]
            impl [<$name Proxy>] {
                $($proxies)*
            }

            impl $crate::Proxy for [<$name Proxy>] {
                type Protocol = dyn $name;

                fn reference(&self) -> &$crate::ActorRef<dyn $name> {
                    &self.reference
                }
            }

            impl<A: $crate::Actor + $name> $crate::Protocol<A> for dyn $name {
                type Proxy = [<$name Proxy>];

                fn cast(actor: &mut A) -> &mut Self {
                    actor
                }

                fn proxy(reference: $crate::ActorRef<Self>) -> Self::Proxy {
                    [<$name Proxy>] { reference }
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{ActorRef, Completes, Proxy, ProtocolTarget};
    use crate::address::{Address, AddressFactory};
    use parking_lot::Mutex;
    use std::sync::Arc;

    crate::actor_protocol! {
        /// Test protocol.
        pub trait Ledger {
            fn credit(&mut self, account: String, amount: u64);
            fn reset(&mut self);
            fn balance(&mut self, account: String) -> Completes<u64>;
        }
    }

    #[derive(Default)]
    struct LedgerState {
        entries: Vec<(String, u64)>,
    }

    impl crate::Actor for LedgerState {}

    impl Ledger for LedgerState {
        fn credit(&mut self, account: String, amount: u64) {
            self.entries.push((account, amount));
        }

        fn reset(&mut self) {
            self.entries.clear();
        }

        fn balance(&mut self, account: String) -> Completes<u64> {
            let total = self
                .entries
                .iter()
                .filter(|(name, _)| *name == account)
                .map(|(_, amount)| amount)
                .sum();
            Completes::with(total)
        }
    }

    /// Runs operations inline and records what the proxy sent.
    struct InlineTarget {
        address: Address,
        state: Mutex<LedgerState>,
        sent: Mutex<Vec<&'static str>>,
    }

    impl ProtocolTarget<dyn Ledger> for InlineTarget {
        fn address(&self) -> &Address {
            &self.address
        }

        fn is_stopped(&self) -> bool {
            false
        }

        fn pending_messages(&self) -> usize {
            0
        }

        fn send(
            self: Arc<Self>,
            representation: &'static str,
            operation: Box<dyn FnOnce(&mut (dyn Ledger + 'static)) + Send>,
        ) {
            self.sent.lock().push(representation);
            let mut state = self.state.lock();
            let ledger: &mut dyn Ledger = &mut *state;
            operation(ledger);
        }

        fn stop(self: Arc<Self>) {
            self.sent.lock().push("stop");
        }
    }

    fn inline_proxy() -> (Arc<InlineTarget>, LedgerProxy) {
        let target = Arc::new(InlineTarget {
            address: AddressFactory::new().unique_with("ledger"),
            state: Mutex::new(LedgerState::default()),
            sent: Mutex::new(Vec::new()),
        });
        let reference: ActorRef<dyn Ledger> = ActorRef::new(target.clone());
        let proxy = <dyn Ledger as crate::Protocol<LedgerState>>::proxy(reference);
        (target, proxy)
    }

    #[test]
    fn test_proxy_methods_become_messages_with_representations() {
        let (target, ledger) = inline_proxy();

        ledger.credit("alice".to_string(), 10);
        ledger.credit("bob".to_string(), 5);
        ledger.credit("alice".to_string(), 7);
        let balance = ledger.balance("alice".to_string());
        ledger.reset();
        ledger.stop();

        assert_eq!(balance.try_outcome(), Some(Ok(17)));
        assert_eq!(
            *target.sent.lock(),
            vec![
                "Ledger::credit(String, u64)",
                "Ledger::credit(String, u64)",
                "Ledger::credit(String, u64)",
                "Ledger::balance(String)",
                "Ledger::reset()",
                "stop",
            ]
        );
        assert!(target.state.lock().entries.is_empty());
    }

    #[test]
    fn test_proxy_exposes_reference_details() {
        let (_target, ledger) = inline_proxy();
        let copy = ledger.clone();
        assert_eq!(ledger.address().name(), Some("ledger"));
        assert_eq!(ledger.reference(), copy.reference());
        assert!(!ledger.is_stopped());
        assert_eq!(ledger.pending_messages(), 0);
    }
}
