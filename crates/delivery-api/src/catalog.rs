//! Catalog records: meals from the public API, menu items, favorites and
//! recent searches

use chrono::{DateTime, Local};
use delivery_util::{ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Meal category as returned by TheMealDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "idCategory")]
    pub id: String,
    #[serde(rename = "strCategory")]
    pub name: String,
    #[serde(rename = "strCategoryThumb")]
    pub thumb: String,
    #[serde(rename = "strCategoryDescription", default)]
    pub description: String,
}

/// Full meal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    #[serde(rename = "idMeal")]
    pub id: ProductId,
    #[serde(rename = "strMeal")]
    pub name: String,
    #[serde(rename = "strMealThumb", default)]
    pub thumb: String,
    #[serde(rename = "strInstructions", default)]
    pub instructions: Option<String>,
    #[serde(rename = "strCategory", default)]
    pub category: Option<String>,
    #[serde(rename = "strArea", default)]
    pub area: Option<String>,
}

/// Meal as listed by the category filter endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSummary {
    #[serde(rename = "idMeal")]
    pub id: ProductId,
    #[serde(rename = "strMeal")]
    pub name: String,
    #[serde(rename = "strMealThumb", default)]
    pub thumb: String,
}

impl From<MealSummary> for Meal {
    fn from(s: MealSummary) -> Self {
        Self {
            id: s.id,
            name: s.name,
            thumb: s.thumb,
            instructions: None,
            category: None,
            area: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoriesResponse {
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// The API answers `{"meals": null}` when nothing matches.
#[derive(Debug, Clone, Deserialize)]
pub struct MealsResponse<T> {
    pub meals: Option<Vec<T>>,
}

impl<T> MealsResponse<T> {
    pub fn into_vec(self) -> Vec<T> {
        self.meals.unwrap_or_default()
    }
}

/// Product card shown in listings; the source of a favorite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: String,
    pub rating: f32,
    pub review_count: u32,
    #[serde(default)]
    pub delivery_time: String,
    #[serde(default)]
    pub distance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    pub id: String,
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: String,
    pub rating: f32,
    pub review_count: u32,
    pub user_id: UserId,
    pub favorited_at: DateTime<Local>,
}

/// All favorites of one user; the collection holds one per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFavorites {
    pub user_id: UserId,
    pub items: Vec<FavoriteItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSearch {
    pub id: String,
    pub term: String,
    pub user_id: UserId,
    pub searched_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecentSearches {
    pub user_id: UserId,
    pub searches: Vec<RecentSearch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_meals_decode_as_empty() {
        let resp: MealsResponse<Meal> = serde_json::from_str(r#"{"meals": null}"#).unwrap();
        assert!(resp.into_vec().is_empty());
    }

    #[test]
    fn decode_meal_lookup() {
        let json = r#"{"meals":[{
            "idMeal":"52772",
            "strMeal":"Teriyaki Chicken Casserole",
            "strMealThumb":"https://www.themealdb.com/images/media/meals/wvpsxx1468256321.jpg",
            "strInstructions":"Preheat oven to 350",
            "strCategory":"Chicken",
            "strArea":"Japanese",
            "strTags":"Meat,Casserole"
        }]}"#;

        let meals = serde_json::from_str::<MealsResponse<Meal>>(json)
            .unwrap()
            .into_vec();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].id.as_str(), "52772");
        assert_eq!(meals[0].category.as_deref(), Some("Chicken"));
    }

    #[test]
    fn decode_categories() {
        let json = r#"{"categories":[{
            "idCategory":"1",
            "strCategory":"Beef",
            "strCategoryThumb":"https://www.themealdb.com/images/category/beef.png",
            "strCategoryDescription":"Beef is the culinary name for meat from cattle."
        }]}"#;

        let resp: CategoriesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.categories[0].name, "Beef");
    }
}
