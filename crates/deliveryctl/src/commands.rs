//! Subcommands and their handlers

use anyhow::{Context, Result, bail};
use clap::{Subcommand, ValueEnum};
use delivery_api::{
    CartItem, Decimal, Location, MenuItem, NewCard, NewUser, PaymentMethod, ProfileUpdate,
};
use delivery_catalog::{GeocodedAddress, GeocoderChain, MealClient};
use delivery_core::{CheckoutRequest, DeliveryApp};
use delivery_util::{CardId, NotificationId, OrderId, ProductId, UserId};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Log in with email or phone
    Login {
        identifier: String,
        password: String,
        #[arg(long)]
        remember: bool,
    },
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Edit the profile of the current user
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Passwd {
        current: String,
        new: String,
    },
    #[command(subcommand)]
    Cart(CartCommand),
    #[command(subcommand)]
    Cards(CardCommand),
    /// Place an order from the current cart
    Checkout {
        #[arg(long, value_enum, default_value_t = Payment::Cash)]
        payment: Payment,
        #[arg(long)]
        card: Option<String>,
        #[arg(long)]
        coupon: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Stay attached until tracking finishes
        #[arg(long)]
        follow: bool,
    },
    #[command(subcommand)]
    Orders(OrderCommand),
    #[command(subcommand)]
    Coupons(CouponCommand),
    #[command(subcommand)]
    Locations(LocationCommand),
    #[command(subcommand)]
    Notifications(NotificationCommand),
    #[command(subcommand)]
    Favorites(FavoriteCommand),
    #[command(subcommand)]
    Searches(SearchCommand),
    #[command(subcommand)]
    Meals(MealCommand),
    #[command(subcommand)]
    Store(StoreCommand),
}

#[derive(Subcommand, Debug)]
pub enum CartCommand {
    Show,
    Add {
        product_id: String,
        name: String,
        price: Decimal,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        notes: Option<String>,
    },
    Remove {
        product_id: String,
    },
    /// Set a line's quantity; zero or less removes it
    Quantity {
        product_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    Clear,
    /// Attach a coupon to the cart; it is redeemed when the order is placed
    Coupon {
        code: String,
    },
    /// Drop the applied coupon from the cart
    Uncoupon,
}

#[derive(Subcommand, Debug)]
pub enum CardCommand {
    List,
    Add {
        #[arg(long)]
        number: String,
        #[arg(long)]
        holder: String,
        #[arg(long)]
        cvv: String,
        /// MM/YY
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        default: bool,
    },
    Default {
        card_id: String,
    },
    Remove {
        card_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    List {
        /// Every user's orders
        #[arg(long)]
        all: bool,
    },
    Show {
        order_id: String,
    },
    Cancel {
        order_id: String,
    },
    /// Mark an order delivered
    Complete {
        order_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CouponCommand {
    /// Issuance counters per code
    Stats,
    /// Unexpired coupons of the current user
    Mine,
    /// Issue a random coupon to the current user
    Grant,
}

#[derive(Subcommand, Debug)]
pub enum LocationCommand {
    List,
    Current,
    /// Save an address; missing fields are looked up from the coordinates
    Add {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        zip: Option<String>,
        #[arg(long, default_value = "")]
        complement: String,
        /// Also make it the current location
        #[arg(long)]
        current: bool,
    },
    Remove {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Move addresses saved before per-user storage to the current user
    Migrate,
    /// Look up the address at a coordinate without saving it
    Geocode {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommand {
    List,
    Read { id: String },
    ReadAll,
    Delete { id: String },
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum FavoriteCommand {
    List,
    /// Add or remove a product
    Toggle {
        product_id: String,
        name: String,
        price: Decimal,
        #[arg(long, default_value = "")]
        image: String,
    },
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SearchCommand {
    List,
    Add { term: String },
    Remove { id: String },
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum MealCommand {
    Categories,
    Category {
        name: String,
    },
    /// Search by name, optionally inside one category
    Search {
        query: String,
        #[arg(long)]
        category: Option<String>,
    },
    Show {
        meal_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    /// Byte size of every stored key
    Info,
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    Import {
        file: PathBuf,
    },
    /// Delete every key the app manages
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Payment {
    Card,
    Cash,
    Pix,
}

impl From<Payment> for PaymentMethod {
    fn from(p: Payment) -> Self {
        match p {
            Payment::Card => PaymentMethod::Card,
            Payment::Cash => PaymentMethod::Cash,
            Payment::Pix => PaymentMethod::Pix,
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The `--user` override, else the logged-in user
fn acting_user(app: &DeliveryApp, explicit: Option<&str>) -> Result<UserId> {
    if let Some(id) = explicit {
        return Ok(UserId::new(id));
    }
    match app.sessions.current()? {
        Some(session) => Ok(session.user.id),
        None => bail!("Not logged in; run `deliveryctl login` or pass --user"),
    }
}

/// Chosen address, else the current one, else the last saved one
fn delivery_address(app: &DeliveryApp, user_id: &UserId) -> Result<Location> {
    let profile = app.users.get(user_id)?;
    if let Some(location) = profile.chosen_location {
        return Ok(location);
    }
    if let Some(location) = app.locations.current(user_id)? {
        return Ok(location);
    }
    app.locations
        .last(user_id)?
        .context("No delivery address saved; add one with `deliveryctl locations add`")
}

pub async fn run(app: &DeliveryApp, user: Option<&str>, command: Command) -> Result<()> {
    match command {
        Command::Register {
            name,
            email,
            phone,
            password,
        } => {
            let profile = app.users.create(NewUser {
                name,
                email,
                phone,
                password,
                img: None,
            })?;
            print_json(&profile)
        }
        Command::Login {
            identifier,
            password,
            remember,
        } => match app.sessions.login(&identifier, &password, remember)? {
            Some(session) => {
                println!("Logged in as {} ({})", session.user.name, session.user.id);
                Ok(())
            }
            None => bail!("Invalid credentials"),
        },
        Command::Logout => {
            app.sessions.logout()?;
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => match app.sessions.current()? {
            Some(session) => print_json(&session.user),
            None => bail!("Not logged in"),
        },
        Command::Profile { name, email, phone } => {
            let user_id = acting_user(app, user)?;
            let profile = app.users.update_profile(
                &user_id,
                ProfileUpdate {
                    name,
                    email,
                    phone,
                    img: None,
                },
            )?;
            print_json(&profile)
        }
        Command::Passwd { current, new } => {
            let user_id = acting_user(app, user)?;
            app.users.change_password(&user_id, &current, &new)?;
            println!("Password changed");
            Ok(())
        }
        Command::Cart(cmd) => run_cart(app, acting_user(app, user)?, cmd),
        Command::Cards(cmd) => run_cards(app, acting_user(app, user)?, cmd),
        Command::Checkout {
            payment,
            card,
            coupon,
            notes,
            follow,
        } => {
            let user_id = acting_user(app, user)?;
            let address = delivery_address(app, &user_id)?;
            let order = app
                .checkout
                .place_order(CheckoutRequest {
                    user_id,
                    address,
                    payment_method: payment.into(),
                    card_id: card.map(CardId::new),
                    coupon_code: coupon,
                    notes,
                })
                .await?;
            print_json(&order)?;

            if follow {
                info!(order_id = %order.id, "Following order");
                while app.tracker.active().contains(&order.id) {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                let order = app.orders.get(&order.id)?;
                println!("Order {} is now {}", order.id, order.status.label());
            }
            Ok(())
        }
        Command::Orders(cmd) => run_orders(app, user, cmd).await,
        Command::Coupons(cmd) => {
            let user_id = acting_user(app, user);
            match cmd {
                CouponCommand::Stats => print_json(&app.coupons.stats()?),
                CouponCommand::Mine => print_json(&app.coupons.user_coupons(&user_id?)?),
                CouponCommand::Grant => match app.coupons.distribute_random(&user_id?).await? {
                    Some(coupon) => print_json(&coupon),
                    None => bail!("Every coupon code is exhausted"),
                },
            }
        }
        Command::Locations(cmd) => run_locations(app, user, cmd).await,
        Command::Notifications(cmd) => {
            let notifications = &app.notifications;
            match cmd {
                NotificationCommand::List => {
                    println!("{} unread", notifications.unread_count()?);
                    print_json(&notifications.all()?)
                }
                NotificationCommand::Read { id } => {
                    Ok(notifications.mark_read(&NotificationId::new(id))?)
                }
                NotificationCommand::ReadAll => Ok(notifications.mark_all_read()?),
                NotificationCommand::Delete { id } => {
                    Ok(notifications.delete(&NotificationId::new(id))?)
                }
                NotificationCommand::Clear => Ok(notifications.clear_all()?),
            }
        }
        Command::Favorites(cmd) => {
            let user_id = acting_user(app, user)?;
            match cmd {
                FavoriteCommand::List => print_json(&app.favorites.list(&user_id)?),
                FavoriteCommand::Toggle {
                    product_id,
                    name,
                    price,
                    image,
                } => {
                    let item = MenuItem {
                        id: ProductId::new(product_id),
                        name,
                        price,
                        image,
                        rating: 0.0,
                        review_count: 0,
                        delivery_time: String::new(),
                        distance: String::new(),
                        discount: None,
                    };
                    let now_favorite = app.favorites.toggle(&user_id, &item)?;
                    println!(
                        "{} {}",
                        item.name,
                        if now_favorite { "added to favorites" } else { "removed from favorites" }
                    );
                    Ok(())
                }
                FavoriteCommand::Clear => Ok(app.favorites.clear(&user_id)?),
            }
        }
        Command::Searches(cmd) => {
            let user_id = acting_user(app, user)?;
            let searches = &app.recent_searches;
            match cmd {
                SearchCommand::List => print_json(&searches.list(&user_id)?),
                SearchCommand::Add { term } => {
                    if searches.add(&user_id, &term)?.is_none() {
                        bail!("Search term is blank");
                    }
                    Ok(())
                }
                SearchCommand::Remove { id } => {
                    if !searches.remove(&user_id, &id)? {
                        bail!("No recent search with id {}", id);
                    }
                    Ok(())
                }
                SearchCommand::Clear => Ok(searches.clear(&user_id)?),
            }
        }
        Command::Meals(cmd) => run_meals(app, user, cmd).await,
        Command::Store(cmd) => run_store(app, cmd),
    }
}

fn run_cart(app: &DeliveryApp, user_id: UserId, cmd: CartCommand) -> Result<()> {
    let cart = &app.cart;
    let updated = match cmd {
        CartCommand::Show => cart.get(&user_id)?,
        CartCommand::Add {
            product_id,
            name,
            price,
            quantity,
            notes,
        } => {
            let mut item = CartItem::new(product_id, name, price, quantity);
            item.notes = notes;
            cart.add_item(&user_id, item)?
        }
        CartCommand::Remove { product_id } => {
            cart.remove_item(&user_id, &ProductId::new(product_id))?
        }
        CartCommand::Quantity {
            product_id,
            quantity,
        } => cart.update_quantity(&user_id, &ProductId::new(product_id), quantity)?,
        CartCommand::Clear => {
            cart.clear(&user_id)?;
            cart.get(&user_id)?
        }
        CartCommand::Coupon { code } => {
            let outcome = app.checkout.apply_coupon(&user_id, &code)?;
            if !outcome.success {
                bail!("{}", outcome.message);
            }
            println!("{}", outcome.message);
            cart.get(&user_id)?
        }
        CartCommand::Uncoupon => cart.remove_coupon(&user_id)?,
    };
    print_json(&updated)
}

fn run_cards(app: &DeliveryApp, user_id: UserId, cmd: CardCommand) -> Result<()> {
    let cards = &app.cards;
    match cmd {
        CardCommand::List => print_json(&cards.for_user(&user_id)?),
        CardCommand::Add {
            number,
            holder,
            cvv,
            expiry,
            default,
        } => {
            let card = cards.save(
                &user_id,
                NewCard {
                    number,
                    holder,
                    cvv,
                    expiry,
                    is_default: default,
                },
            )?;
            print_json(&card)
        }
        CardCommand::Default { card_id } => {
            Ok(cards.set_default(&CardId::new(card_id), &user_id)?)
        }
        CardCommand::Remove { card_id } => Ok(cards.remove(&CardId::new(card_id), &user_id)?),
    }
}

async fn run_orders(app: &DeliveryApp, user: Option<&str>, cmd: OrderCommand) -> Result<()> {
    match cmd {
        OrderCommand::List { all: true } => print_json(&app.orders.all()?),
        OrderCommand::List { all: false } => {
            print_json(&app.orders.for_user(&acting_user(app, user)?)?)
        }
        OrderCommand::Show { order_id } => print_json(&app.orders.get(&OrderId::new(order_id))?),
        OrderCommand::Cancel { order_id } => {
            let user_id = acting_user(app, user)?;
            let order_id = OrderId::new(order_id);
            app.tracker.stop(&order_id);
            print_json(&app.orders.cancel(&order_id, &user_id)?)
        }
        OrderCommand::Complete { order_id } => {
            let order_id = OrderId::new(order_id);
            app.tracker.complete(&order_id).await?;
            print_json(&app.orders.get(&order_id)?)
        }
    }
}

async fn run_locations(app: &DeliveryApp, user: Option<&str>, cmd: LocationCommand) -> Result<()> {
    if let LocationCommand::Geocode { lat, lon } = cmd {
        let chain = GeocoderChain::from_settings(&app.settings.geocoding)?;
        let address = chain.reverse(lat, lon).await;
        println!("{}", address.address);
        println!("{} - {} {}", address.city, address.state, address.zip_code);
        return Ok(());
    }

    let user_id = acting_user(app, user)?;
    let locations = &app.locations;
    match cmd {
        LocationCommand::List => print_json(&locations.list(&user_id)?),
        LocationCommand::Current => match locations.current(&user_id)? {
            Some(location) => print_json(&location),
            None => bail!("No current location"),
        },
        LocationCommand::Add {
            lat,
            lon,
            address,
            city,
            state,
            zip,
            complement,
            current,
        } => {
            let needs_lookup =
                address.is_none() || city.is_none() || state.is_none() || zip.is_none();
            let found = if needs_lookup {
                debug!(lat, lon, "Filling address fields from geocoder");
                let chain = GeocoderChain::from_settings(&app.settings.geocoding)?;
                chain.reverse(lat, lon).await
            } else {
                GeocodedAddress::placeholder()
            };

            let location = Location {
                latitude: lat,
                longitude: lon,
                address: address.unwrap_or(found.address),
                city: city.unwrap_or(found.city),
                state: state.unwrap_or(found.state),
                zip_code: zip.unwrap_or(found.zip_code),
                complement,
                reference: String::new(),
                user_id,
            };

            locations.save(location.clone())?;
            if current {
                locations.save_current(&location)?;
            }
            print_json(&location)
        }
        LocationCommand::Remove { lat, lon } => Ok(locations.remove(&user_id, lat, lon)?),
        LocationCommand::Migrate => Ok(locations.migrate_to_user_specific(&user_id)?),
        LocationCommand::Geocode { .. } => Ok(()),
    }
}

async fn run_meals(app: &DeliveryApp, user: Option<&str>, cmd: MealCommand) -> Result<()> {
    let client = MealClient::from_settings(&app.settings.catalog);
    match cmd {
        MealCommand::Categories => {
            for category in client.categories().await? {
                println!("{}", category.name);
            }
            Ok(())
        }
        MealCommand::Category { name } => {
            for meal in client.meals_by_category(&name).await? {
                println!("{}\t{}", meal.id, meal.name);
            }
            Ok(())
        }
        MealCommand::Search { query, category } => {
            let meals = match &category {
                Some(category) => client.search_by_name_in_category(&query, category).await?,
                None => client.search_by_name(&query).await?,
            };

            // Searches are remembered for whoever is logged in
            if let Ok(user_id) = acting_user(app, user) {
                app.recent_searches.add(&user_id, &query)?;
            }

            for meal in meals {
                println!("{}\t{}", meal.id, meal.name);
            }
            Ok(())
        }
        MealCommand::Show { meal_id } => match client.lookup(&meal_id).await? {
            Some(meal) => print_json(&meal),
            None => bail!("No meal with id {}", meal_id),
        },
    }
}

fn run_store(app: &DeliveryApp, cmd: StoreCommand) -> Result<()> {
    let maintenance = &app.maintenance;
    match cmd {
        StoreCommand::Info => {
            for (key, size) in maintenance.storage_info()? {
                println!("{:>10}  {}", size, key);
            }
            Ok(())
        }
        StoreCommand::Export { out } => {
            let json = maintenance.export_all()?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {:?}", path)),
                None => {
                    println!("{}", json);
                    Ok(())
                }
            }
        }
        StoreCommand::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let written = maintenance.import(&json)?;
            println!("Imported {} keys", written);
            Ok(())
        }
        StoreCommand::Clear => {
            app.tracker.clear_all();
            let removed = maintenance.clear_all()?;
            println!("Removed {} keys", removed);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "deliveryctl", "locations", "add", "--lat", "-23.55", "--lon", "-46.63", "--current",
        ])
        .unwrap();
        match cli.command {
            Command::Locations(LocationCommand::Add { lat, lon, current, .. }) => {
                assert_eq!(lat, -23.55);
                assert_eq!(lon, -46.63);
                assert!(current);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_decimal_prices() {
        let cli = Cli::try_parse_from(["deliveryctl", "cart", "add", "52772", "Teriyaki", "12.50", "-q", "2"])
            .unwrap();
        match cli.command {
            Command::Cart(CartCommand::Add { price, quantity, .. }) => {
                assert_eq!(price, Decimal::new(1250, 2));
                assert_eq!(quantity, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn payment_defaults_to_cash() {
        let cli = Cli::try_parse_from(["deliveryctl", "checkout"]).unwrap();
        match cli.command {
            Command::Checkout { payment, follow, .. } => {
                assert!(matches!(PaymentMethod::from(payment), PaymentMethod::Cash));
                assert!(!follow);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
