//! Meal catalog client

use delivery_api::{CategoriesResponse, Category, Meal, MealSummary, MealsResponse};
use delivery_config::{CatalogSettings, DEFAULT_MEAL_API_URL};
use tracing::debug;

use crate::{CatalogResult, check_response_json};

/// Read-only client for TheMealDB
#[derive(Debug, Clone)]
pub struct MealClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for MealClient {
    fn default() -> Self {
        Self::new(DEFAULT_MEAL_API_URL)
    }
}

impl MealClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &CatalogSettings) -> Self {
        Self::new(settings.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn categories(&self) -> CatalogResult<Vec<Category>> {
        let resp: CategoriesResponse = self.get("categories.php", &[]).await?;
        debug!(count = resp.categories.len(), "Fetched categories");
        Ok(resp.categories)
    }

    pub async fn meals_by_category(&self, category: &str) -> CatalogResult<Vec<MealSummary>> {
        let resp: MealsResponse<MealSummary> = self.get("filter.php", &[("c", category)]).await?;
        Ok(resp.into_vec())
    }

    /// Full-text search by meal name. A blank query matches nothing and
    /// does not hit the network.
    pub async fn search_by_name(&self, query: &str) -> CatalogResult<Vec<Meal>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let resp: MealsResponse<Meal> = self.get("search.php", &[("s", query)]).await?;
        Ok(resp.into_vec())
    }

    /// Name search restricted to one category.
    ///
    /// The API has no combined filter, so this lists the category and
    /// matches names case-insensitively on our side. Results carry no
    /// instructions.
    pub async fn search_by_name_in_category(
        &self,
        query: &str,
        category: &str,
    ) -> CatalogResult<Vec<Meal>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let needle = query.to_lowercase();
        let meals = self
            .meals_by_category(category)
            .await?
            .into_iter()
            .filter(|m| m.name.to_lowercase().contains(&needle))
            .map(Meal::from)
            .collect();
        Ok(meals)
    }

    pub async fn lookup(&self, meal_id: &str) -> CatalogResult<Option<Meal>> {
        let resp: MealsResponse<Meal> = self.get("lookup.php", &[("i", meal_id)]).await?;
        Ok(resp.into_vec().into_iter().next())
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> CatalogResult<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, ?query, "Catalog request");

        let response = self.http.get(&url).query(query).send().await?;
        check_response_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CatalogError;
    use crate::stub::StubServer;

    #[tokio::test]
    async fn lists_categories() {
        let server = StubServer::start(vec![(
            200,
            r#"{"categories":[
                {"idCategory":"1","strCategory":"Beef","strCategoryThumb":"b.png","strCategoryDescription":"Beef"},
                {"idCategory":"2","strCategory":"Chicken","strCategoryThumb":"c.png","strCategoryDescription":"Chicken"}
            ]}"#,
        )])
        .await;
        let client = MealClient::new(server.url());

        let categories = client.categories().await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1].name, "Chicken");

        let requests = server.requests();
        assert!(requests[0].starts_with("GET /categories.php"));
    }

    #[tokio::test]
    async fn null_meals_are_empty() {
        let server = StubServer::start(vec![(200, r#"{"meals":null}"#)]).await;
        let client = MealClient::new(server.url());

        let meals = client.search_by_name("zzzz").await.unwrap();
        assert!(meals.is_empty());
        assert!(server.requests()[0].starts_with("GET /search.php?s=zzzz"));
    }

    #[tokio::test]
    async fn blank_search_skips_the_network() {
        let server = StubServer::start(vec![]).await;
        let client = MealClient::new(server.url());

        assert!(client.search_by_name("   ").await.unwrap().is_empty());
        assert!(
            client
                .search_by_name_in_category("", "Beef")
                .await
                .unwrap()
                .is_empty()
        );
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn category_search_filters_by_name() {
        let server = StubServer::start(vec![(
            200,
            r#"{"meals":[
                {"idMeal":"1","strMeal":"Beef Wellington","strMealThumb":"w.jpg"},
                {"idMeal":"2","strMeal":"Beef and Mustard Pie","strMealThumb":"p.jpg"},
                {"idMeal":"3","strMeal":"Corned Beef","strMealThumb":"c.jpg"}
            ]}"#,
        )])
        .await;
        let client = MealClient::new(server.url());

        let meals = client
            .search_by_name_in_category("PIE", "Beef")
            .await
            .unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].id.as_str(), "2");
        assert!(meals[0].instructions.is_none());
        assert!(server.requests()[0].starts_with("GET /filter.php?c=Beef"));
    }

    #[tokio::test]
    async fn lookup_returns_first_match() {
        let server = StubServer::start(vec![
            (
                200,
                r#"{"meals":[{"idMeal":"52772","strMeal":"Teriyaki Chicken Casserole","strCategory":"Chicken"}]}"#,
            ),
            (200, r#"{"meals":null}"#),
        ])
        .await;
        let client = MealClient::new(server.url());

        let meal = client.lookup("52772").await.unwrap().unwrap();
        assert_eq!(meal.name, "Teriyaki Chicken Casserole");
        assert!(client.lookup("0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = StubServer::start(vec![(503, "unavailable")]).await;
        let client = MealClient::new(server.url());

        let err = client.categories().await.unwrap_err();
        assert!(matches!(err, CatalogError::Status { status: 503, .. }));
        // No retry
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = StubServer::start(vec![(200, "<html>")]).await;
        let client = MealClient::new(server.url());

        let err = client.meals_by_category("Beef").await.unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = MealClient::new("http://localhost:1/api/");
        assert_eq!(client.base_url(), "http://localhost:1/api");
    }
}
